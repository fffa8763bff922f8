
use crate::cli::client::CliClient;
use crate::controller::registry::{Registry, ReplicationTargetConfig, SvcConfig};
use crate::service::Service;
use agents::errors::SvcError;
use fake_array::FakeArray;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use stor_port::types::v0::{
    store::definitions::{AdminMetadataStore, InMemoryStore},
    transport::*,
};
use utils::VDISKCOPYOPS_METADATA_KEY;

const GIB: u64 = 1 << 30;

/// Poll periods small enough to keep the tests fast; the copy-ops
/// reconcile period is long by default so tests can observe the pending
/// state, and short where a test wants the loop to drain.
fn test_config(
    reconcile_period: Duration,
    replication_target: Option<ReplicationTargetConfig>,
) -> SvcConfig {
    SvcConfig {
        pool: PoolId::from("pool0"),
        cache_period: Duration::from_millis(20),
        reconcile_period,
        fc_poll_period: Duration::from_millis(2),
        fc_prepare_timeout: Duration::from_secs(2),
        fc_copy_rate: 50,
        replication_target,
    }
}

async fn start_service(array: &Arc<FakeArray>) -> Service {
    start_service_with(array, Arc::new(InMemoryStore::new()), Duration::from_secs(600)).await
}

async fn start_service_with(
    array: &Arc<FakeArray>,
    store: Arc<InMemoryStore>,
    reconcile_period: Duration,
) -> Service {
    let client = CliClient::new(array.clone(), '!');
    let registry = Registry::new(client, None, store, test_config(reconcile_period, None));
    Service::start(registry).await.unwrap()
}

fn create_request(name: &str, size: u64) -> CreateVolume {
    CreateVolume {
        uuid: VolumeId::new(),
        name: VdiskName::from(name),
        size,
        pool: PoolId::from("pool0"),
        type_spec: VolumeTypeSpec::default(),
        group: None,
    }
}

fn type_spec(extra_specs: &[(&str, &str)]) -> VolumeTypeSpec {
    VolumeTypeSpec {
        name: "custom".to_string(),
        extra_specs: extra_specs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
        qos: HashMap::new(),
    }
}

/// Create 1G thin volume, snapshot it, delete the source while the
/// snapshot lives, then delete the snapshot and check the target vdisk is
/// fully released.
#[tokio::test]
async fn volume_snapshot_delete_lifecycle() {
    let array = FakeArray::new("site1");
    let service = start_service(&array).await;

    let volume = create_request("volume-1", GIB);
    let created = service.create_volume(&volume).await.unwrap();
    assert_eq!(created.status, VolumeStatus::Available);
    assert!(array.vdisk_exists("volume-1"));

    let snapshot = CreateSnapshot {
        uuid: SnapshotId::new(),
        name: VdiskName::from("snapshot-1"),
        source_uuid: volume.uuid.clone(),
        source_name: volume.name.clone(),
    };
    service.create_snapshot(&snapshot).await.unwrap();
    assert!(array.vdisk_exists("snapshot-1"));
    assert_eq!(array.fcmap_count(), 1);

    // the array permits deleting a source with dependent snapshots: the
    // zero-rate mapping is converted to a real copy and awaited
    service
        .delete_volume(&DestroyVolume {
            uuid: volume.uuid.clone(),
            name: volume.name.clone(),
        })
        .await
        .unwrap();
    assert!(!array.vdisk_exists("volume-1"));
    assert_eq!(array.fcmap_count(), 0);
    assert!(array.vdisk_exists("snapshot-1"));

    service
        .delete_snapshot(&DestroySnapshot {
            uuid: snapshot.uuid.clone(),
            name: snapshot.name.clone(),
        })
        .await
        .unwrap();
    assert!(!array.vdisk_exists("snapshot-1"));
}

#[tokio::test]
async fn extend_volume_refuses_snapshots() {
    let array = FakeArray::new("site1");
    let service = start_service(&array).await;

    let volume = create_request("volume-1", GIB);
    service.create_volume(&volume).await.unwrap();
    let snapshot = CreateSnapshot {
        uuid: SnapshotId::new(),
        name: VdiskName::from("snapshot-1"),
        source_uuid: volume.uuid.clone(),
        source_name: volume.name.clone(),
    };
    service.create_snapshot(&snapshot).await.unwrap();

    let extend = ExtendVolume {
        uuid: volume.uuid.clone(),
        name: volume.name.clone(),
        size: GIB,
        new_size: 2 * GIB,
    };
    let error = service.extend_volume(&extend).await.unwrap_err();
    assert!(matches!(error, SvcError::VdiskHasSnapshots { .. }), "{error}");

    // shrink requests never reach the array
    let shrink = ExtendVolume {
        uuid: volume.uuid.clone(),
        name: volume.name.clone(),
        size: GIB,
        new_size: GIB / 2,
    };
    let error = service.extend_volume(&shrink).await.unwrap_err();
    assert!(matches!(error, SvcError::ResizeInvalid { .. }), "{error}");

    // a snapshot-free volume extends fine
    let other = create_request("volume-2", GIB);
    service.create_volume(&other).await.unwrap();
    service
        .extend_volume(&ExtendVolume {
            uuid: other.uuid.clone(),
            name: other.name.clone(),
            size: GIB,
            new_size: 2 * GIB,
        })
        .await
        .unwrap();
    let vdisk = service.existing_vdisk(&other.name).await.unwrap();
    assert_eq!(vdisk.capacity, 2 * GIB);
}

/// A vdisk already carrying two copies is at the array limit: adding a
/// third must always fail, regardless of pool or type arguments.
#[tokio::test]
async fn vdisk_copy_count_invariant() {
    let array = FakeArray::new("site1");
    let service = start_service(&array).await;

    let volume = create_request("volume-1", GIB);
    service.create_volume(&volume).await.unwrap();
    service
        .migrate_volume(&MigrateVolume {
            uuid: volume.uuid.clone(),
            name: volume.name.clone(),
            dest_pool: PoolId::from("pool1"),
            type_spec: VolumeTypeSpec::default(),
        })
        .await
        .unwrap();
    assert_eq!(array.vdisk_copy_pools("volume-1").len(), 2);

    for pool in ["pool0", "pool1"] {
        let error = service
            .add_vdisk_copy(
                &volume.uuid,
                &volume.name,
                &PoolId::from(pool),
                &VdiskOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(error, SvcError::MaximumCopies { .. }), "{error}");
    }
}

/// The in-memory tracking map and the persisted metadata mirror always
/// agree, through both the add and the remove side.
#[tokio::test]
async fn pending_copy_ops_mirror_the_metadata() {
    let array = FakeArray::new("site1");
    let store = Arc::new(InMemoryStore::new());
    let service = start_service_with(&array, store.clone(), Duration::from_secs(600)).await;

    let volume = create_request("volume-1", GIB);
    service.create_volume(&volume).await.unwrap();
    service
        .migrate_volume(&MigrateVolume {
            uuid: volume.uuid.clone(),
            name: volume.name.clone(),
            dest_pool: PoolId::from("pool1"),
            type_spec: VolumeTypeSpec::default(),
        })
        .await
        .unwrap();

    let ops = service.registry().copy_ops().await;
    let (_, pending) = ops.get(&volume.uuid).expect("one pending op");
    let persisted = store
        .get(&volume.uuid, VDISKCOPYOPS_METADATA_KEY)
        .await
        .unwrap()
        .expect("metadata mirror present");
    let decoded: stor_port::types::v0::store::volume::VdiskCopyOps = persisted.parse().unwrap();
    assert_eq!(&decoded, pending);
    assert_eq!(decoded.len(), 1);

    // progress is reported off the new copy's synchronisation
    let progress = service.migration_progress(&volume.uuid).await.unwrap();
    assert!(progress <= 100);

    // deleting the volume clears the tracking map and the mirror together
    service
        .delete_volume(&DestroyVolume {
            uuid: volume.uuid.clone(),
            name: volume.name.clone(),
        })
        .await
        .unwrap();
    assert!(service.registry().copy_ops().await.is_empty());
    assert!(store
        .get(&volume.uuid, VDISKCOPYOPS_METADATA_KEY)
        .await
        .unwrap()
        .is_none());
}

/// The reconciliation loop removes the original copy once the new copy is
/// in sync, then goes quiet: it never polls with an empty tracked set.
#[tokio::test]
async fn copy_ops_reconciliation_drains_and_stops() {
    let array = FakeArray::new("site1");
    let store = Arc::new(InMemoryStore::new());
    let service = start_service_with(&array, store.clone(), Duration::from_millis(20)).await;

    let volume = create_request("volume-1", GIB);
    service.create_volume(&volume).await.unwrap();
    service
        .migrate_volume(&MigrateVolume {
            uuid: volume.uuid.clone(),
            name: volume.name.clone(),
            dest_pool: PoolId::from("pool1"),
            type_spec: VolumeTypeSpec::default(),
        })
        .await
        .unwrap();

    // wait for the reconciler to see the new copy synchronise
    let mut drained = false;
    for _ in 0..100 {
        if service.registry().copy_ops().await.is_empty() {
            drained = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(drained, "the pending copy op was not reconciled away");
    assert_eq!(array.vdisk_copy_pools("volume-1"), vec!["pool1".to_string()]);
    assert!(store
        .get(&volume.uuid, VDISKCOPYOPS_METADATA_KEY)
        .await
        .unwrap()
        .is_none());

    // with the tracked set empty the loop stops polling copy state
    let polls = |commands: &[String]| {
        commands
            .iter()
            .filter(|command| command.contains("lsvdiskcopy"))
            .count()
    };
    let before = polls(&array.commands());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(polls(&array.commands()), before);

    // stopping an already-stopped loop is a no-op
    service.shutdown().await;
    service.shutdown().await;
}

/// Pending operations survive a driver restart through the persisted
/// metadata mirror.
#[tokio::test]
async fn pending_copy_ops_survive_restart() {
    let array = FakeArray::new("site1");
    let store = Arc::new(InMemoryStore::new());
    let service = start_service_with(&array, store.clone(), Duration::from_secs(600)).await;

    let volume = create_request("volume-1", GIB);
    let created = service.create_volume(&volume).await.unwrap();
    service
        .migrate_volume(&MigrateVolume {
            uuid: volume.uuid.clone(),
            name: volume.name.clone(),
            dest_pool: PoolId::from("pool1"),
            type_spec: VolumeTypeSpec::default(),
        })
        .await
        .unwrap();
    assert_eq!(
        service
            .registry()
            .copy_ops()
            .await
            .get(&volume.uuid)
            .map(|(_, ops)| ops.len()),
        Some(1)
    );
    service.shutdown().await;

    // a fresh service over the same store re-learns the pending pair and
    // drives the migration to completion
    let restarted = start_service_with(&array, store.clone(), Duration::from_millis(20)).await;
    assert!(restarted.registry().copy_ops().await.is_empty());
    restarted.restore_copy_ops(&[created]).await.unwrap();

    let mut drained = false;
    for _ in 0..100 {
        if restarted.registry().copy_ops().await.is_empty() {
            drained = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(drained, "the restored copy op was not reconciled away");
    assert_eq!(array.vdisk_copy_pools("volume-1"), vec!["pool1".to_string()]);
    assert!(store
        .get(&volume.uuid, VDISKCOPYOPS_METADATA_KEY)
        .await
        .unwrap()
        .is_none());
}

/// In-place retype changes never add a copy; allocation changes do.
#[tokio::test]
async fn retype_in_place_versus_copy() {
    let array = FakeArray::new("site1");
    let service = start_service(&array).await;

    let volume = create_request("volume-1", GIB);
    service.create_volume(&volume).await.unwrap();

    service
        .retype(&RetypeVolume {
            uuid: volume.uuid.clone(),
            name: volume.name.clone(),
            current_type: VolumeTypeSpec::default(),
            new_type: type_spec(&[("easytier", "false"), ("warning", "80")]),
            current_pool: PoolId::from("pool0"),
            new_pool: PoolId::from("pool0"),
        })
        .await
        .unwrap();
    assert_eq!(array.vdisk_copy_pools("volume-1").len(), 1);
    assert!(!array
        .commands()
        .iter()
        .any(|command| command.contains("addvdiskcopy")));

    service
        .retype(&RetypeVolume {
            uuid: volume.uuid.clone(),
            name: volume.name.clone(),
            current_type: VolumeTypeSpec::default(),
            new_type: type_spec(&[("rsize", "-1")]),
            current_pool: PoolId::from("pool0"),
            new_pool: PoolId::from("pool0"),
        })
        .await
        .unwrap();
    assert_eq!(array.vdisk_copy_pools("volume-1").len(), 2);
}

#[tokio::test]
async fn volume_type_specs_are_validated() {
    let array = FakeArray::new("site1");
    let service = start_service(&array).await;

    let mut request = create_request("volume-1", GIB);
    request.type_spec = type_spec(&[("grainsize", "48")]);
    let error = service.create_volume(&request).await.unwrap_err();
    assert!(matches!(error, SvcError::InvalidOption { .. }), "{error}");

    request.type_spec = type_spec(&[("iogrp", "7")]);
    let error = service.create_volume(&request).await.unwrap_err();
    assert!(matches!(error, SvcError::InvalidOption { .. }), "{error}");
    assert!(!array.vdisk_exists("volume-1"));
}

/// Group snapshots fan out under one scratch consistency group which is
/// deleted right after the atomic start.
#[tokio::test]
async fn group_snapshot_is_atomic_scratch_state() {
    let array = FakeArray::new("site1");
    let service = start_service(&array).await;

    for name in ["volume-1", "volume-2"] {
        service.create_volume(&create_request(name, GIB)).await.unwrap();
    }
    let request = CreateGroupSnapshot {
        uuid: GroupSnapshotId::new(),
        group: GroupId::new(),
        members: vec![
            GroupSnapshotMember {
                uuid: SnapshotId::new(),
                name: VdiskName::from("gsnap-1"),
                source_name: VdiskName::from("volume-1"),
            },
            GroupSnapshotMember {
                uuid: SnapshotId::new(),
                name: VdiskName::from("gsnap-2"),
                source_name: VdiskName::from("volume-2"),
            },
        ],
    };
    service.create_group_snapshot(&request).await.unwrap();

    assert!(array.vdisk_exists("gsnap-1"));
    assert!(array.vdisk_exists("gsnap-2"));
    assert_eq!(array.fcmap_count(), 2);
    // the array-side group is single-use scratch state
    assert_eq!(array.cg_count(), 0);
}

/// On any member failure the whole group fan-out rolls back: no targets,
/// no mappings, no group object survive.
#[tokio::test]
async fn group_snapshot_rolls_back_fully() {
    let array = FakeArray::new("site1");
    let service = start_service(&array).await;

    service
        .create_volume(&create_request("volume-1", GIB))
        .await
        .unwrap();
    let request = CreateGroupSnapshot {
        uuid: GroupSnapshotId::new(),
        group: GroupId::new(),
        members: vec![
            GroupSnapshotMember {
                uuid: SnapshotId::new(),
                name: VdiskName::from("gsnap-1"),
                source_name: VdiskName::from("volume-1"),
            },
            GroupSnapshotMember {
                uuid: SnapshotId::new(),
                name: VdiskName::from("gsnap-2"),
                source_name: VdiskName::from("volume-missing"),
            },
        ],
    };
    let error = service.create_group_snapshot(&request).await.unwrap_err();
    assert!(matches!(error, SvcError::NotFound { .. }), "{error}");

    assert!(!array.vdisk_exists("gsnap-1"));
    assert!(!array.vdisk_exists("gsnap-2"));
    assert_eq!(array.fcmap_count(), 0);
    assert_eq!(array.cg_count(), 0);
}

#[tokio::test]
async fn group_from_source_clones_members() {
    let array = FakeArray::new("site1");
    let service = start_service(&array).await;

    for name in ["volume-1", "volume-2"] {
        service.create_volume(&create_request(name, GIB)).await.unwrap();
    }
    let request = CreateGroupFromSource {
        group: GroupId::new(),
        members: vec![
            GroupCloneMember {
                volume: create_request("clone-1", GIB),
                source_name: VdiskName::from("volume-1"),
            },
            GroupCloneMember {
                volume: create_request("clone-2", GIB),
                source_name: VdiskName::from("volume-2"),
            },
        ],
    };
    let volumes = service.create_group_from_source(&request).await.unwrap();
    assert_eq!(volumes.len(), 2);
    assert!(array.vdisk_exists("clone-1"));
    assert!(array.vdisk_exists("clone-2"));
    assert_eq!(array.cg_count(), 0);
}

#[tokio::test]
async fn manage_existing_checks_pool_and_type() {
    let array = FakeArray::new("site1");
    let service = start_service(&array).await;

    // an unmanaged vdisk, carved outside the driver
    service
        .registry()
        .client()
        .mkvdisk(
            &VdiskName::from("legacy"),
            &PoolId::from("pool1"),
            GIB,
            &VdiskOptions::default(),
        )
        .await
        .unwrap();

    let mut request = ManageExistingVolume {
        uuid: VolumeId::new(),
        name: VdiskName::from("volume-1"),
        existing_name: VdiskName::from("legacy"),
        type_spec: VolumeTypeSpec::default(),
        pool: PoolId::from("pool0"),
    };
    let error = service.manage_existing(&request).await.unwrap_err();
    assert!(matches!(error, SvcError::ManageMismatch { .. }), "{error}");

    request.pool = PoolId::from("pool1");
    assert_eq!(service.manage_existing_get_size(&request.existing_name).await.unwrap(), GIB);
    let managed = service.manage_existing(&request).await.unwrap();
    assert_eq!(managed.size, GIB);
    assert!(array.vdisk_exists("volume-1"));
    assert!(!array.vdisk_exists("legacy"));
}

#[tokio::test]
async fn host_attach_detach_lifecycle() {
    let array = FakeArray::new("site1");
    let service = start_service(&array).await;

    let volume = create_request("volume-1", GIB);
    service.create_volume(&volume).await.unwrap();
    let connector = Connector {
        host: "compute-1.lab".to_string(),
        wwpns: vec!["500507680110ABCD".to_string()],
        initiator: None,
    };
    let info = service
        .initialize_connection(&volume.name, &connector)
        .await
        .unwrap();
    assert_eq!(info.mapping.scsi_id, 0);
    assert!(!info.target_wwpns.is_empty());
    assert!(!info.target_iqns.is_empty());

    // a second attach reuses the host object
    let other = create_request("volume-2", GIB);
    service.create_volume(&other).await.unwrap();
    let info = service
        .initialize_connection(&other.name, &connector)
        .await
        .unwrap();
    assert_eq!(info.mapping.scsi_id, 1);

    service
        .terminate_connection(&volume.name, &connector)
        .await
        .unwrap();
    service
        .terminate_connection(&other.name, &connector)
        .await
        .unwrap();
    // the host object is removed with its last mapping
    let hosts = service.registry().client().lshost().await.unwrap();
    assert!(hosts.is_empty());
}

// ===== replication =====

fn replication_target() -> ReplicationTargetConfig {
    ReplicationTargetConfig {
        backend_id: "site2".to_string(),
        cluster_name: "site2".to_string(),
        pool: PoolId::from("pool0"),
        mode: ReplicationMode::Global,
        bandwidth_mbps: 100,
        remote_ip: None,
    }
}

async fn start_replicated() -> (Arc<FakeArray>, Arc<FakeArray>, Service) {
    let (local, remote) = FakeArray::paired("site1", "site2");
    let client = CliClient::new(local.clone(), '!');
    let target_client = CliClient::new(remote.clone(), '!');
    let registry = Registry::new(
        client,
        Some(target_client),
        Arc::new(InMemoryStore::new()),
        test_config(Duration::from_secs(600), Some(replication_target())),
    );
    let service = Service::start(registry).await.unwrap();
    (local, remote, service)
}

fn replicated_type() -> VolumeTypeSpec {
    type_spec(&[("replication", "<is> True")])
}

async fn create_replicated(service: &Service, name: &str) -> Volume {
    let mut request = create_request(name, GIB);
    request.type_spec = replicated_type();
    service.create_volume(&request).await.unwrap()
}

#[tokio::test]
async fn replicated_volume_setup_and_teardown() {
    let (local, remote, service) = start_replicated().await;

    let volume = create_replicated(&service, "volume-1").await;
    assert_eq!(volume.replication_status, ReplicationStatus::Enabled);
    assert!(remote.vdisk_exists("aux_volume-1"));
    assert_eq!(
        local.rcrel_state("rcrel_volume-1").as_deref(),
        Some("consistent_synchronized")
    );

    let status = service.replication_status(&volume).await.unwrap();
    assert_eq!(
        status.and_then(|update| update.replication_status),
        Some(ReplicationStatus::Enabled)
    );

    service
        .delete_volume(&DestroyVolume {
            uuid: volume.uuid.clone(),
            name: volume.name.clone(),
        })
        .await
        .unwrap();
    assert!(local.rcrel_state("rcrel_volume-1").is_none());
    assert!(!remote.vdisk_exists("aux_volume-1"));
}

/// Failover only acts for the configured target backend id.
#[tokio::test]
async fn failover_validates_the_target_backend() {
    let (_local, remote, service) = start_replicated().await;
    let volume = create_replicated(&service, "volume-1").await;

    let error = service
        .failover_host(&FailoverHost {
            secondary_backend_id: ClusterId::from("some-other-backend"),
            volumes: vec![volume.clone()],
        })
        .await
        .unwrap_err();
    assert!(
        matches!(error, SvcError::ReplicationTargetMismatch { .. }),
        "{error}"
    );
    // per-volume strategy checks are a no-op on mismatch
    let update = service
        .replication()
        .unwrap()
        .failover_volume_host("some-other-backend", &volume)
        .await
        .unwrap();
    assert!(update.is_none());

    let updates = service
        .failover_host(&FailoverHost {
            secondary_backend_id: ClusterId::from("site2"),
            volumes: vec![volume.clone()],
        })
        .await
        .unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(
        updates[0].update.replication_status,
        Some(ReplicationStatus::FailedOver)
    );
    assert_eq!(remote.rcrel_state("rcrel_volume-1").as_deref(), Some("idling"));
}

#[tokio::test]
async fn promote_replica_grants_target_access() {
    let (_local, remote, service) = start_replicated().await;
    let volume = create_replicated(&service, "volume-1").await;

    let update = service.promote_replica(&volume).await.unwrap();
    assert_eq!(
        update.and_then(|update| update.replication_status),
        Some(ReplicationStatus::FailedOver)
    );
    assert_eq!(remote.rcrel_state("rcrel_volume-1").as_deref(), Some("idling"));
}

/// Failback requires every volume to be in a synchronized-family state;
/// a mixed batch is refused outright and nothing changes.
#[tokio::test]
async fn failback_refuses_partial_batches() {
    let (local, _remote, service) = start_replicated().await;
    let volume_1 = create_replicated(&service, "volume-1").await;
    let volume_2 = create_replicated(&service, "volume-2").await;

    local.set_rcrel_state("rcrel_volume-2", "consistent_stopped");
    let error = service
        .replication_failback(&[volume_1.clone(), volume_2.clone()])
        .await
        .unwrap_err();
    assert!(matches!(error, SvcError::FailbackNotReady { .. }), "{error}");
    // no volume changed state
    assert_eq!(
        local.rcrel_state("rcrel_volume-1").as_deref(),
        Some("consistent_synchronized")
    );
    assert_eq!(
        local.rcrel_state("rcrel_volume-2").as_deref(),
        Some("consistent_stopped")
    );
    assert!(!local
        .commands()
        .iter()
        .any(|command| command.contains("switchrcrelationship")));

    // once every relationship is synchronized the batch goes through
    local.set_rcrel_state("rcrel_volume-2", "consistent_synchronized");
    let updates = service
        .replication_failback(&[volume_1, volume_2])
        .await
        .unwrap();
    assert_eq!(updates.len(), 2);
    assert!(updates
        .iter()
        .all(|update| update.update.replication_status == Some(ReplicationStatus::Enabled)));
}

#[tokio::test]
async fn replicated_volume_extend_recreates_the_relationship() {
    let (local, remote, service) = start_replicated().await;
    let volume = create_replicated(&service, "volume-1").await;

    service
        .extend_volume(&ExtendVolume {
            uuid: volume.uuid.clone(),
            name: volume.name.clone(),
            size: GIB,
            new_size: 2 * GIB,
        })
        .await
        .unwrap();
    let vdisk = service.existing_vdisk(&volume.name).await.unwrap();
    assert_eq!(vdisk.capacity, 2 * GIB);
    // the auxiliary side grew too and the relationship is back up
    let commands = remote.commands();
    assert!(commands.iter().any(|command| command.contains("expandvdisksize")));
    assert_eq!(
        local.rcrel_state("rcrel_volume-1").as_deref(),
        Some("consistent_synchronized")
    );
}

#[tokio::test]
async fn clone_and_restore_from_snapshot() {
    let array = FakeArray::new("site1");
    let service = start_service(&array).await;

    let volume = create_request("volume-1", GIB);
    service.create_volume(&volume).await.unwrap();
    let snapshot = CreateSnapshot {
        uuid: SnapshotId::new(),
        name: VdiskName::from("snapshot-1"),
        source_uuid: volume.uuid.clone(),
        source_name: volume.name.clone(),
    };
    service.create_snapshot(&snapshot).await.unwrap();

    let restored = service
        .create_volume_from_snapshot(&CreateVolumeFromSnapshot {
            volume: create_request("volume-2", GIB),
            snapshot_name: snapshot.name.clone(),
            snapshot_size: GIB,
        })
        .await
        .unwrap();
    assert_eq!(restored.status, VolumeStatus::Available);
    assert!(array.vdisk_exists("volume-2"));

    // a new volume smaller than its source is refused up front
    let error = service
        .create_volume_from_snapshot(&CreateVolumeFromSnapshot {
            volume: create_request("volume-small", GIB / 2),
            snapshot_name: snapshot.name.clone(),
            snapshot_size: GIB,
        })
        .await
        .unwrap_err();
    assert!(matches!(error, SvcError::SourceSizeInvalid { .. }), "{error}");
    assert!(!array.vdisk_exists("volume-small"));

    let cloned = service
        .create_cloned_volume(&CloneVolume {
            volume: create_request("volume-3", GIB),
            source_name: volume.name.clone(),
            source_size: GIB,
        })
        .await
        .unwrap();
    assert_eq!(cloned.name.as_str(), "volume-3");
    assert!(array.vdisk_exists("volume-3"));
}

/// Group create/update/delete are database-side bookkeeping plus member
/// operations; the array never holds a durable group object.
#[tokio::test]
async fn group_membership_is_database_state() {
    let array = FakeArray::new("site1");
    let service = start_service(&array).await;

    let group = GroupId::new();
    service.create_group(&group).await.unwrap();

    let volume_1 = create_request("volume-1", GIB);
    let volume_2 = create_request("volume-2", GIB);
    let one = service.create_volume(&volume_1).await.unwrap();
    let two = service.create_volume(&volume_2).await.unwrap();
    service
        .update_group(&group, &[one, two], &[])
        .await
        .unwrap();
    assert_eq!(array.cg_count(), 0);

    let snapshot = CreateGroupSnapshot {
        uuid: GroupSnapshotId::new(),
        group: group.clone(),
        members: vec![
            GroupSnapshotMember {
                uuid: SnapshotId::new(),
                name: VdiskName::from("gsnap-1"),
                source_name: volume_1.name.clone(),
            },
            GroupSnapshotMember {
                uuid: SnapshotId::new(),
                name: VdiskName::from("gsnap-2"),
                source_name: volume_2.name.clone(),
            },
        ],
    };
    service.create_group_snapshot(&snapshot).await.unwrap();
    service
        .delete_group_snapshot(
            &snapshot.uuid,
            &[
                DestroySnapshot {
                    uuid: snapshot.members[0].uuid.clone(),
                    name: snapshot.members[0].name.clone(),
                },
                DestroySnapshot {
                    uuid: snapshot.members[1].uuid.clone(),
                    name: snapshot.members[1].name.clone(),
                },
            ],
        )
        .await
        .unwrap();
    assert!(!array.vdisk_exists("gsnap-1"));
    assert!(!array.vdisk_exists("gsnap-2"));

    service
        .delete_group(
            &group,
            &[
                DestroyVolume {
                    uuid: volume_1.uuid.clone(),
                    name: volume_1.name.clone(),
                },
                DestroyVolume {
                    uuid: volume_2.uuid.clone(),
                    name: volume_2.name.clone(),
                },
            ],
        )
        .await
        .unwrap();
    assert!(!array.vdisk_exists("volume-1"));
    assert!(!array.vdisk_exists("volume-2"));
}

#[tokio::test]
async fn pool_stats_report_capabilities() {
    let array = FakeArray::new("site1");
    let service = start_service(&array).await;
    service.create_volume(&create_request("volume-1", GIB)).await.unwrap();

    let stats = service.get_volume_stats().await.unwrap();
    assert_eq!(stats.len(), 2);
    let pool0 = stats
        .iter()
        .find(|stats| stats.pool_name.as_str() == "pool0")
        .unwrap();
    assert!(pool0.thin_provisioning_support);
    assert!(pool0.compression_support);
    assert!(pool0.total_capacity_gb > pool0.free_capacity_gb);
}
