use getset::Getters;
use serde::{Deserialize, Serialize};

use crate::{
    cri::{PortMapping, Protocol},
    ShimError, ShimResult,
};

use super::Checksum;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The schema version written into every checkpoint.
pub const CHECKPOINT_VERSION: &str = "v1";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A port mapping as persisted in a checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointPortMapping {
    /// The protocol of the port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,

    /// The port inside the pod.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_port: Option<i32>,

    /// The port on the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<i32>,

    /// The node address the port is bound to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host_ip: String,
}

/// The checksummed payload of a checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointData {
    /// The port mappings of the sandbox, in request order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_mappings: Vec<CheckpointPortMapping>,

    /// Whether the sandbox uses the node network.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub host_network: bool,
}

/// The durable record of a pod sandbox.
///
/// ## Example
///
/// ```
/// use crishim::checkpoint::{CheckpointData, PodSandboxCheckpoint};
///
/// let checkpoint = PodSandboxCheckpoint::new("web", "default", CheckpointData::default());
/// let bytes = checkpoint.marshal().unwrap();
/// let decoded = PodSandboxCheckpoint::unmarshal(&bytes).unwrap();
/// assert_eq!(decoded.get_name(), "web");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[getset(get = "pub with_prefix")]
pub struct PodSandboxCheckpoint {
    /// The schema version.
    version: String,

    /// The pod name.
    name: String,

    /// The pod namespace.
    namespace: String,

    /// The checksummed payload.
    data: CheckpointData,

    /// The checksum of `data`.
    checksum: Checksum,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CheckpointPortMapping {
    /// Converts the persisted mapping back into a CRI port mapping.
    pub fn to_port_mapping(&self) -> PortMapping {
        PortMapping {
            protocol: self.protocol.unwrap_or_default(),
            container_port: self.container_port.unwrap_or_default(),
            host_port: self.host_port.unwrap_or_default(),
            host_ip: self.host_ip.clone(),
        }
    }
}

impl CheckpointData {
    /// Builds the payload from the port mappings and network mode of a sandbox.
    pub fn new(port_mappings: &[PortMapping], host_network: bool) -> Self {
        Self {
            port_mappings: port_mappings.iter().map(Into::into).collect(),
            host_network,
        }
    }
}

impl PodSandboxCheckpoint {
    /// Creates a checkpoint. The checksum is computed when the checkpoint is marshalled.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, data: CheckpointData) -> Self {
        Self {
            version: CHECKPOINT_VERSION.to_string(),
            name: name.into(),
            namespace: namespace.into(),
            data,
            checksum: Checksum::default(),
        }
    }

    /// Encodes the checkpoint, embedding the checksum of its payload.
    pub fn marshal(&self) -> ShimResult<Vec<u8>> {
        let mut sealed = self.clone();
        sealed.checksum = Checksum::of(&sealed.data)?;
        Ok(serde_json::to_vec(&sealed)?)
    }

    /// Decodes a checkpoint and verifies its checksum.
    ///
    /// Undecodable bytes and checksum mismatches both fail with
    /// [`ShimError::CorruptCheckpoint`].
    pub fn unmarshal(bytes: &[u8]) -> ShimResult<Self> {
        let checkpoint: Self = serde_json::from_slice(bytes)
            .map_err(|e| ShimError::CorruptCheckpoint(format!("undecodable checkpoint: {}", e)))?;
        checkpoint.verify_checksum()?;
        Ok(checkpoint)
    }

    /// Checks the embedded checksum against the payload.
    pub fn verify_checksum(&self) -> ShimResult<()> {
        self.checksum.verify(&self.data)
    }

    /// Returns the port mappings in CRI form.
    pub fn port_mappings(&self) -> Vec<PortMapping> {
        self.data
            .port_mappings
            .iter()
            .map(CheckpointPortMapping::to_port_mapping)
            .collect()
    }

    /// Returns true if the sandbox uses the node network.
    pub fn is_host_network(&self) -> bool {
        self.data.host_network
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<&PortMapping> for CheckpointPortMapping {
    fn from(mapping: &PortMapping) -> Self {
        Self {
            protocol: Some(mapping.protocol),
            container_port: Some(mapping.container_port),
            host_port: Some(mapping.host_port),
            host_ip: mapping.host_ip.clone(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PodSandboxCheckpoint {
        let ports = vec![
            PortMapping::builder()
                .container_port(80)
                .host_port(8080)
                .build(),
            PortMapping::builder()
                .protocol(Protocol::Udp)
                .container_port(53)
                .host_port(5353)
                .host_ip("127.0.0.1")
                .build(),
        ];
        PodSandboxCheckpoint::new("web", "default", CheckpointData::new(&ports, false))
    }

    #[test]
    fn test_checkpoint_wire_format() -> anyhow::Result<()> {
        let bytes = sample().marshal()?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;

        assert_eq!(value["version"], "v1");
        assert_eq!(value["name"], "web");
        assert_eq!(value["namespace"], "default");
        assert_eq!(value["data"]["port_mappings"][0]["protocol"], "TCP");
        assert_eq!(value["data"]["port_mappings"][0]["container_port"], 80);
        assert_eq!(value["data"]["port_mappings"][0]["host_port"], 8080);
        assert!(value["data"]["port_mappings"][0].get("host_ip").is_none());
        assert_eq!(value["data"]["port_mappings"][1]["host_ip"], "127.0.0.1");
        assert!(value["checksum"].is_u64());

        Ok(())
    }

    #[test]
    fn test_checkpoint_verify_after_marshal() -> anyhow::Result<()> {
        let checkpoint = sample();
        let decoded = PodSandboxCheckpoint::unmarshal(&checkpoint.marshal()?)?;

        assert_eq!(decoded.get_data(), checkpoint.get_data());
        assert_eq!(decoded.port_mappings()[1].protocol, Protocol::Udp);
        assert!(!decoded.is_host_network());
        Ok(())
    }

    #[test]
    fn test_checkpoint_flipped_checksum_byte_is_corrupt() -> anyhow::Result<()> {
        let bytes = sample().marshal()?;
        let text = String::from_utf8(bytes)?;
        let start = text.find("\"checksum\":").map(|i| i + "\"checksum\":".len());
        let start = start.ok_or_else(|| anyhow::anyhow!("no checksum field"))?;
        let digits = text[start..]
            .chars()
            .take_while(char::is_ascii_digit)
            .count();

        for offset in 0..digits {
            let mut flipped = text.clone().into_bytes();
            flipped[start + offset] ^= 0x01;
            let result = PodSandboxCheckpoint::unmarshal(&flipped);
            assert!(
                matches!(result, Err(ShimError::CorruptCheckpoint(_))),
                "flipping checksum byte {} was not detected",
                offset
            );
        }

        Ok(())
    }

    #[test]
    fn test_checkpoint_garbage_is_corrupt() {
        assert!(PodSandboxCheckpoint::unmarshal(b"{not json")
            .unwrap_err()
            .is_corrupt_checkpoint());
        assert!(PodSandboxCheckpoint::unmarshal(b"")
            .unwrap_err()
            .is_corrupt_checkpoint());
    }
}
