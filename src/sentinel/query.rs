//! Sentinel Queries
//!
//! Topology discovery over a regular (non pub/sub) Sentinel connection.

use super::types::Address;
use crate::error::{Error, Result};
use crate::redis::{RedisClient, RedisReply};

/// One entry of `SENTINEL MASTERS`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterDetails {
    pub name: String,
    pub address: Address,
    pub flags: Vec<String>,
    pub quorum: u32,
    pub num_slaves: u32,
    pub num_other_sentinels: u32,
}

impl MasterDetails {
    /// Sentinel considers the master subjectively or objectively down
    pub fn is_down(&self) -> bool {
        self.flags
            .iter()
            .any(|f| f == "s_down" || f == "o_down" || f == "disconnected")
    }
}

/// Run `SENTINEL MASTERS`
pub async fn masters<C: RedisClient>(client: &C) -> Result<Vec<MasterDetails>> {
    let reply = client.cmd(&["SENTINEL", "MASTERS"]).await?.into_result()?;
    parse_masters(&reply)
}

/// Run `SENTINEL GET-MASTER-ADDR-BY-NAME`; `None` when the master is unknown
pub async fn master_address<C: RedisClient>(client: &C, name: &str) -> Result<Option<Address>> {
    let reply = client
        .cmd(&["SENTINEL", "GET-MASTER-ADDR-BY-NAME", name])
        .await?
        .into_result()?;

    if reply == RedisReply::Null {
        return Ok(None);
    }

    match reply.to_list().as_deref() {
        Some([host, port]) => Ok(Some(Address::new(host.as_str(), parse_port(port)?))),
        _ => Err(Error::Protocol(format!(
            "unexpected get-master-addr-by-name reply: {:?}",
            reply
        ))),
    }
}

fn parse_masters(reply: &RedisReply) -> Result<Vec<MasterDetails>> {
    if !matches!(reply, RedisReply::Array(_)) {
        return Err(Error::Protocol(format!(
            "unexpected sentinel masters reply: {:?}",
            reply
        )));
    }

    reply.elems().iter().map(parse_master).collect()
}

fn parse_master(entry: &RedisReply) -> Result<MasterDetails> {
    let info = entry
        .to_hash()
        .ok_or_else(|| Error::Protocol("master entry is not a field list".into()))?;

    let field = |name: &str| {
        info.get(name)
            .cloned()
            .ok_or_else(|| Error::Protocol(format!("master entry missing '{}'", name)))
    };
    let number = |name: &str| info.get(name).and_then(|s| s.parse().ok()).unwrap_or(0);

    Ok(MasterDetails {
        name: field("name")?,
        address: Address::new(field("ip")?, parse_port(&field("port")?)?),
        flags: info
            .get("flags")
            .map(|f| f.split(',').map(String::from).collect())
            .unwrap_or_default(),
        quorum: number("quorum"),
        num_slaves: number("num-slaves"),
        num_other_sentinels: number("num-other-sentinels"),
    })
}

fn parse_port(s: &str) -> Result<u16> {
    s.parse::<u16>()
        .map_err(|_| Error::Protocol(format!("invalid port '{}'", s)))
}
