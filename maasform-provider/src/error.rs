//! Mapping from MAAS client failures to provider errors

use maasform_client::ClientError;
use maasform_core::provider::ProviderError;
use maasform_core::resource::ResourceId;

/// Translate a client failure on `id` into the provider error taxonomy
pub(crate) fn from_client(id: &ResourceId) -> impl FnOnce(ClientError) -> ProviderError + '_ {
    move |err| {
        let error = match &err {
            ClientError::NotFound(message) => ProviderError::not_found(message.clone()),
            ClientError::Rejected { .. } => ProviderError::rejected(err.to_string()),
            ClientError::Transport(_) | ClientError::Decode(_) => {
                ProviderError::transport(err.to_string())
            }
            ClientError::Config(_) => ProviderError::invalid_config(err.to_string()),
        };
        error.for_resource(id.clone()).with_cause(err)
    }
}

/// Like [`from_client`], but a 404 means the parent boot source is missing
pub(crate) fn from_client_with_parent(
    id: &ResourceId,
    boot_source: i64,
) -> impl FnOnce(ClientError) -> ProviderError + '_ {
    move |err| {
        if err.is_not_found() {
            ProviderError::rejected(format!("boot source {} does not exist", boot_source))
                .for_resource(id.clone())
                .with_cause(err)
        } else {
            from_client(id)(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maasform_core::provider::ErrorKind;

    #[test]
    fn maps_each_client_error_kind() {
        let id = ResourceId::new("maas_boot_source_selection", "test");

        let err = from_client(&id)(ClientError::NotFound("gone".into()));
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.to_string(), "[maas_boot_source_selection.test] gone");

        let err = from_client(&id)(ClientError::rejected(400, "bad release"));
        assert_eq!(err.kind, ErrorKind::RemoteRejected);

        let decode = serde_json::from_str::<i64>("nope").unwrap_err();
        let err = from_client(&id)(ClientError::Decode(decode));
        assert_eq!(err.kind, ErrorKind::Transport);

        let err = from_client(&id)(ClientError::Config("bad key".into()));
        assert_eq!(err.kind, ErrorKind::InvalidConfig);
    }

    #[test]
    fn missing_parent_is_rejected() {
        let id = ResourceId::new("maas_boot_source_selection", "test");
        let err = from_client_with_parent(&id, 9)(ClientError::NotFound("no".into()));
        assert_eq!(err.kind, ErrorKind::RemoteRejected);
        assert!(err.message.contains("boot source 9"));
    }
}
