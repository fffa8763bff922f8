//! Host mapping: the attach/detach surface. The driver finds (or creates)
//! the host object matching the connector's initiator ports, then maps or
//! unmaps the vdisk.

use crate::service::Service;
use agents::errors::SvcError;
use stor_port::transport_api::ResourceKind;
use stor_port::types::v0::transport::{ConnectionInfo, Connector, Host, HostMapping, HostName, VdiskName};

impl Service {
    /// Map a vdisk to the connecting host, creating the host object on
    /// first contact. Returns the mapping together with the target ports
    /// of the online nodes.
    pub(crate) async fn initialize_connection(
        &self,
        name: &VdiskName,
        connector: &Connector,
    ) -> Result<ConnectionInfo, SvcError> {
        let registry = self.registry();
        self.existing_vdisk(name).await?;
        let host = match self.find_host(connector).await? {
            Some(host) => host.name,
            None => self.create_host(connector).await?,
        };
        let map_id = registry.client().mkvdiskhostmap(&host, name, None).await?;
        let scsi_id = map_id.parse().map_err(|_| SvcError::CliParse {
            command: "mkvdiskhostmap".to_string(),
            reason: "mapping id is not a SCSI LUN id".to_string(),
            output: map_id,
        })?;

        let mut target_wwpns = vec![];
        let mut target_iqns = vec![];
        for node in registry.state().nodes.iter().filter(|node| node.online()) {
            let detail = registry.client().lsnode_detail(&node.name).await?;
            target_wwpns.extend(detail.wwpns);
            if let Some(iqn) = detail.iscsi_name {
                target_iqns.push(iqn);
            }
        }
        Ok(ConnectionInfo {
            mapping: HostMapping {
                host,
                vdisk: name.clone(),
                scsi_id,
            },
            target_wwpns,
            target_iqns,
        })
    }

    /// Unmap a vdisk from the connecting host. The host object is removed
    /// once its last mapping is gone.
    pub(crate) async fn terminate_connection(
        &self,
        name: &VdiskName,
        connector: &Connector,
    ) -> Result<(), SvcError> {
        let registry = self.registry();
        let host = self
            .find_host(connector)
            .await?
            .ok_or_else(|| SvcError::not_found(ResourceKind::Host, &connector.host))?;
        registry.client().rmvdiskhostmap(&host.name, name).await?;
        if registry.client().lshostvdiskmap(&host.name).await?.is_empty() {
            registry.client().rmhost(&host.name).await?;
        }
        Ok(())
    }

    /// Find the host object whose registered ports overlap the
    /// connector's.
    async fn find_host(&self, connector: &Connector) -> Result<Option<Host>, SvcError> {
        let registry = self.registry();
        for (_, host_name) in registry.client().lshost().await? {
            let Some(host) = registry.client().lshost_detail(&host_name).await? else {
                continue;
            };
            let wwpn_match = host
                .wwpns
                .iter()
                .any(|wwpn| connector.wwpns.iter().any(|port| port.eq_ignore_ascii_case(wwpn)));
            let iscsi_match = match &connector.initiator {
                Some(initiator) => host.iscsi_names.iter().any(|name| name == initiator),
                None => false,
            };
            if wwpn_match || iscsi_match {
                return Ok(Some(host));
            }
        }
        Ok(None)
    }

    /// Create a host object registered with every port of the connector.
    async fn create_host(&self, connector: &Connector) -> Result<HostName, SvcError> {
        let registry = self.registry();
        let host = HostName::from(sanitize_host_name(&connector.host));
        let mut wwpns = connector.wwpns.iter();
        match (wwpns.next(), &connector.initiator) {
            (Some(first), _) => {
                registry.client().mkhost_wwpn(&host, first).await?;
                for wwpn in wwpns {
                    registry.client().addhostport_wwpn(&host, wwpn).await?;
                }
                if let Some(initiator) = &connector.initiator {
                    registry.client().addhostport_iscsi(&host, initiator).await?;
                }
            }
            (None, Some(initiator)) => {
                registry.client().mkhost_iscsi(&host, initiator).await?;
            }
            (None, None) => {
                return Err(SvcError::InvalidOption {
                    option: "connector".to_string(),
                    value: connector.host.clone(),
                    reason: "neither FC WWPNs nor an iSCSI initiator given".to_string(),
                })
            }
        }
        Ok(host)
    }
}

/// The array only accepts letters, digits, dash and underscore in object
/// names, and names must not start with a digit or dash.
fn sanitize_host_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if sanitized.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        sanitized.insert(0, '_');
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_names_are_sanitized() {
        assert_eq!(sanitize_host_name("compute-1.lab"), "compute-1_lab");
        assert_eq!(sanitize_host_name("9node"), "_9node");
        assert_eq!(sanitize_host_name("ok_name"), "ok_name");
    }
}
