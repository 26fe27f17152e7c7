//! MAAS entities and request parameters
//!
//! Entities mirror the JSON documents returned by the MAAS 2.0 API.
//! Parameters are sent form-encoded, with list fields repeated once per item.

use serde::{Deserialize, Serialize};

/// A remote image mirror that MAAS syncs boot images from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootSource {
    pub id: i64,
    pub url: String,
    #[serde(default)]
    pub keyring_filename: String,
    #[serde(default)]
    pub keyring_data: String,
}

/// Filter rule selecting which images a boot source syncs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootSourceSelection {
    pub id: i64,
    #[serde(default)]
    pub boot_source_id: i64,
    pub os: String,
    pub release: String,
    #[serde(default)]
    pub arches: Vec<String>,
    #[serde(default)]
    pub subarches: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl BootSourceSelection {
    /// True when arches, subarches and labels hold the values MAAS resets the
    /// default selection to
    pub fn is_reset(&self) -> bool {
        self.arches == ["amd64"] && self.subarches == ["*"] && self.labels == ["*"]
    }
}

/// Form body, one `(name, value)` pair per field
pub type Form = Vec<(String, String)>;

/// Parameters for creating or updating a boot source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootSourceParams {
    pub url: String,
    pub keyring_filename: Option<String>,
    pub keyring_data: Option<String>,
}

impl BootSourceParams {
    pub fn to_form(&self) -> Form {
        let mut form = vec![("url".to_string(), self.url.clone())];
        if let Some(filename) = &self.keyring_filename {
            form.push(("keyring_filename".to_string(), filename.clone()));
        }
        if let Some(data) = &self.keyring_data {
            form.push(("keyring_data".to_string(), data.clone()));
        }
        form
    }
}

/// Parameters for creating or updating a boot source selection
///
/// Empty `subarches` and `labels` are omitted so the server applies `*`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootSourceSelectionParams {
    pub os: String,
    pub release: String,
    pub arches: Vec<String>,
    pub subarches: Vec<String>,
    pub labels: Vec<String>,
}

impl BootSourceSelectionParams {
    pub fn to_form(&self) -> Form {
        let mut form = vec![
            ("os".to_string(), self.os.clone()),
            ("release".to_string(), self.release.clone()),
        ];
        push_list(&mut form, "arches", &self.arches);
        push_list(&mut form, "subarches", &self.subarches);
        push_list(&mut form, "labels", &self.labels);
        form
    }
}

fn push_list(form: &mut Form, name: &str, items: &[String]) {
    form.extend(items.iter().map(|item| (name.to_string(), item.clone())));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_form_repeats_list_fields() {
        let params = BootSourceSelectionParams {
            os: "ubuntu".into(),
            release: "noble".into(),
            arches: vec!["amd64".into(), "arm64".into()],
            ..Default::default()
        };

        let form = params.to_form();
        let arches: Vec<&str> = form
            .iter()
            .filter(|(k, _)| k == "arches")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(arches, vec!["amd64", "arm64"]);
        assert!(!form.iter().any(|(k, _)| k == "subarches" || k == "labels"));
    }

    #[test]
    fn boot_source_form_skips_unset_keyring() {
        let params = BootSourceParams {
            url: "http://images.maas.io/ephemeral-v3/stable/".into(),
            keyring_filename: Some("/usr/share/keyrings/ubuntu-cloudimage-keyring.gpg".into()),
            keyring_data: None,
        };
        let keys: Vec<String> = params.to_form().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["url", "keyring_filename"]);
    }

    #[test]
    fn selection_decodes_maas_document() {
        let json = r#"{
            "os": "ubuntu",
            "release": "noble",
            "arches": ["amd64"],
            "subarches": ["*"],
            "labels": ["*"],
            "boot_source_id": 1,
            "id": 1,
            "resource_uri": "/MAAS/api/2.0/boot-sources/1/selections/1/"
        }"#;
        let selection: BootSourceSelection = serde_json::from_str(json).unwrap();
        assert_eq!(selection.boot_source_id, 1);
        assert!(selection.is_reset());
    }
}
