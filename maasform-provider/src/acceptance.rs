//! Acceptance scenarios for `maas_boot_source_selection`
//!
//! Every scenario runs against the simulated MAAS. The `live_` variant talks
//! to a real region controller and only runs with `--ignored` when
//! `MAAS_API_URL` and `MAAS_API_KEY` are set.

use std::sync::Arc;

use maasform_client::sim::{DEFAULT_BOOT_SOURCE_URL, DEFAULT_KEYRING_FILENAME};
use maasform_client::{ClientConfig, MaasApi, MaasClient, SimulatedMaas};
use maasform_core::provider::ErrorKind;
use maasform_core::resource::{Resource, ResourceId, Value};

use crate::resources::boot_source::{self, BootSourceConfig};
use crate::resources::boot_source_selection::BootSourceSelectionConfig;
use crate::verifier::{LifecycleVerifier, TestStep, VerifyError};

const SELECTION: &str = "maas_boot_source_selection.test";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A boot source and a selection referencing it
fn boot_source_with_selection(os: &str, release: &str, arches: &[&str]) -> Vec<Resource> {
    let source = BootSourceConfig::new(DEFAULT_BOOT_SOURCE_URL)
        .keyring_filename(DEFAULT_KEYRING_FILENAME)
        .into_resource("test");
    let source_id = ResourceId::new(boot_source::RESOURCE_TYPE, "test");
    let selection = BootSourceSelectionConfig::new(Value::reference(&source_id, "id"), os, release)
        .arches(arches.iter().copied())
        .into_resource("test");
    vec![source, selection]
}

fn selection_on(boot_source: i64, os: &str, release: &str, arches: &[&str]) -> Resource {
    BootSourceSelectionConfig::new(boot_source, os, release)
        .arches(arches.iter().copied())
        .into_resource("test")
}

fn basic_step(resources: Vec<Resource>, os: &str, release: &str, arch: &str) -> TestStep {
    TestStep::new(resources)
        .check_exists(SELECTION)
        .check_attr(SELECTION, "os", os)
        .check_attr(SELECTION, "release", release)
        .check_attr(SELECTION, "arches.#", "1")
        .check_attr(SELECTION, "arches.0", arch)
}

#[tokio::test]
async fn selection_under_new_boot_source() {
    init_logging();
    let maas = Arc::new(SimulatedMaas::with_default_boot_source("noble"));
    let verifier = LifecycleVerifier::new(maas.clone());

    let resources = boot_source_with_selection("ubuntu", "oracular", &["amd64"]);
    verifier
        .run(&[basic_step(resources, "ubuntu", "oracular", "amd64")])
        .await
        .unwrap();

    // only the seeded boot source is left
    assert_eq!(maas.boot_sources().await.unwrap().len(), 1);
    assert!(verifier.recorded_state().await.unwrap().resources.is_empty());
}

#[tokio::test]
async fn selection_under_existing_boot_source() {
    init_logging();
    let maas = Arc::new(SimulatedMaas::with_default_boot_source("noble"));
    let verifier = LifecycleVerifier::new(maas.clone());

    verifier
        .provision(&[selection_on(1, "ubuntu", "oracular", &["amd64"])])
        .await
        .unwrap();
    let selection = verifier.check_exists(SELECTION).await.unwrap();
    assert!(selection.id > 0);
    assert_eq!(selection.os, "ubuntu");
    assert_eq!(selection.release, "oracular");
    assert_eq!(selection.arches, vec!["amd64"]);

    let snapshot = verifier.destroy().await.unwrap();
    let err = maas
        .boot_source_selection(1, selection.id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    verifier.check_destroyed(&snapshot).await.unwrap();
}

#[tokio::test]
async fn default_selection_is_reset_on_destroy() {
    init_logging();
    let maas = Arc::new(SimulatedMaas::with_default_boot_source("noble"));
    let verifier = LifecycleVerifier::new(maas.clone());

    let resources = vec![selection_on(1, "ubuntu", "noble", &["arm64"])];
    verifier
        .run(&[basic_step(resources, "ubuntu", "noble", "arm64")])
        .await
        .unwrap();

    let selections = maas.boot_source_selections(1).await.unwrap();
    assert_eq!(selections.len(), 1);
    assert!(selections[0].is_reset());
}

#[tokio::test]
async fn second_step_updates_in_place() {
    init_logging();
    let maas = Arc::new(SimulatedMaas::with_default_boot_source("noble"));
    let verifier = LifecycleVerifier::new(maas.clone());

    let first = vec![selection_on(1, "ubuntu", "oracular", &["amd64"])];
    let second = vec![
        BootSourceSelectionConfig::new(1_i64, "ubuntu", "oracular")
            .arches(["amd64", "arm64"])
            .into_resource("test"),
    ];

    verifier.provision(&first).await.unwrap();
    let before = verifier.check_exists(SELECTION).await.unwrap();

    verifier.provision(&second).await.unwrap();
    let after = verifier.check_exists(SELECTION).await.unwrap();
    assert_eq!(before.id, after.id);
    assert_eq!(after.arches, vec!["amd64", "arm64"]);
    verifier
        .check_attributes(&[crate::AttributeCheck::new(SELECTION, "arches.#", "2")])
        .await
        .unwrap();

    verifier.assert_no_changes(&second).await.unwrap();
    assert!(matches!(
        verifier.assert_no_changes(&first).await,
        Err(VerifyError::PendingChanges(_))
    ));
}

#[tokio::test]
async fn moving_to_another_boot_source_replaces() {
    init_logging();
    let maas = Arc::new(SimulatedMaas::with_default_boot_source("noble"));
    let verifier = LifecycleVerifier::new(maas.clone());

    verifier
        .provision(&[selection_on(1, "ubuntu", "oracular", &["amd64"])])
        .await
        .unwrap();
    let original = verifier.check_exists(SELECTION).await.unwrap();

    let moved = boot_source_with_selection("ubuntu", "oracular", &["amd64"]);
    verifier.provision(&moved).await.unwrap();
    let replaced = verifier.check_exists(SELECTION).await.unwrap();

    assert_ne!(replaced.boot_source_id, 1);
    assert!(
        maas.boot_source_selection(1, original.id)
            .await
            .unwrap_err()
            .is_not_found()
    );

    let snapshot = verifier.destroy().await.unwrap();
    verifier.check_destroyed(&snapshot).await.unwrap();
}

#[tokio::test]
async fn empty_arches_fail_before_any_remote_call() {
    init_logging();
    let maas = Arc::new(SimulatedMaas::with_default_boot_source("noble"));
    let verifier = LifecycleVerifier::new(maas.clone());

    let err = verifier
        .provision(&[selection_on(1, "ubuntu", "oracular", &[])])
        .await
        .unwrap_err();

    match err {
        VerifyError::Provider(e) => assert_eq!(e.kind, ErrorKind::InvalidConfig),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(maas.request_count(), 0);
}

#[tokio::test]
async fn empty_subarches_converge_after_apply() {
    init_logging();
    let maas = Arc::new(SimulatedMaas::with_default_boot_source("noble"));
    let verifier = LifecycleVerifier::new(maas.clone());

    let desired = [BootSourceSelectionConfig::new(1_i64, "ubuntu", "oracular")
        .arches(["amd64"])
        .subarches(Vec::<String>::new())
        .into_resource("test")];

    verifier.provision(&desired).await.unwrap();
    verifier.assert_no_changes(&desired).await.unwrap();
    verifier.provision(&desired).await.unwrap();
    verifier.assert_no_changes(&desired).await.unwrap();

    let snapshot = verifier.destroy().await.unwrap();
    verifier.check_destroyed(&snapshot).await.unwrap();
}

#[tokio::test]
async fn missing_boot_source_is_rejected() {
    init_logging();
    let maas = Arc::new(SimulatedMaas::with_default_boot_source("noble"));
    let verifier = LifecycleVerifier::new(maas.clone());

    let err = verifier
        .provision(&[selection_on(42, "ubuntu", "oracular", &["amd64"])])
        .await
        .unwrap_err();
    match err {
        VerifyError::Provider(e) => assert_eq!(e.kind, ErrorKind::RemoteRejected),
        other => panic!("unexpected error: {other}"),
    }
    assert!(verifier.recorded_state().await.unwrap().resources.is_empty());
}

#[tokio::test]
async fn refresh_prunes_selection_deleted_out_of_band() {
    init_logging();
    let maas = Arc::new(SimulatedMaas::with_default_boot_source("noble"));
    let verifier = LifecycleVerifier::new(maas.clone());
    let desired = vec![selection_on(1, "ubuntu", "oracular", &["amd64"])];

    verifier.provision(&desired).await.unwrap();
    let first = verifier.check_exists(SELECTION).await.unwrap();

    maas.delete_boot_source_selection(1, first.id).await.unwrap();

    // the next apply forgets the vanished selection and creates a new one
    verifier.provision(&desired).await.unwrap();
    let second = verifier.check_exists(SELECTION).await.unwrap();
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn destroy_check_inspects_every_selection() {
    init_logging();
    let maas = Arc::new(SimulatedMaas::with_default_boot_source("noble"));
    let verifier = LifecycleVerifier::new(maas.clone());

    let desired = vec![
        BootSourceSelectionConfig::new(1_i64, "ubuntu", "noble")
            .arches(["amd64"])
            .into_resource("a_default"),
        BootSourceSelectionConfig::new(1_i64, "ubuntu", "oracular")
            .arches(["amd64"])
            .into_resource("b_other"),
    ];
    verifier.provision(&desired).await.unwrap();
    let snapshot = verifier.recorded_state().await.unwrap();
    let other = verifier
        .check_exists("maas_boot_source_selection.b_other")
        .await
        .unwrap();

    // pretend teardown happened but the second selection survived
    let err = verifier.check_destroyed(&snapshot).await.unwrap_err();
    assert!(matches!(err, VerifyError::StillExists { id, .. } if id == other.id));
}

#[tokio::test]
async fn exists_check_requires_state() {
    init_logging();
    let maas = Arc::new(SimulatedMaas::with_default_boot_source("noble"));
    let verifier = LifecycleVerifier::new(maas);

    assert!(matches!(
        verifier.check_exists(SELECTION).await,
        Err(VerifyError::NotInState(_))
    ));
}

#[tokio::test]
#[ignore = "requires a MAAS region controller (MAAS_API_URL, MAAS_API_KEY)"]
async fn live_selection_lifecycle() {
    init_logging();
    let config = ClientConfig::from_env().unwrap();
    let maas: Arc<dyn MaasApi> = Arc::new(MaasClient::new(&config).unwrap());
    let verifier = LifecycleVerifier::new(maas);

    let resources = vec![selection_on(1, "ubuntu", "oracular", &["amd64"])];
    verifier
        .run(&[basic_step(resources, "ubuntu", "oracular", "amd64")])
        .await
        .unwrap();
}
