//! Utility functions for identifiers and content hashing

use bech32::Bech32m;
use uuid7::uuid7;

use crate::error::{MarketResult, StorageResultExt};

pub const EMPLOYEE_HRP: &str = "user_";
pub const ORGANIZATION_HRP: &str = "org_";
pub const RESPONSIBILITY_HRP: &str = "resp_";
pub const REVIEW_HRP: &str = "review_";

// construct a unique time-ordered id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

pub(crate) fn new_id(hrp: &str) -> MarketResult<String> {
    new_uuid_to_bech32(hrp).storage("generate id")
}

// hex sha256 of the cbor encoding, used to compare snapshots with live rows
pub fn content_digest<T: minicbor::Encode<()>>(value: &T) -> MarketResult<String> {
    let bytes = minicbor::to_vec(value).storage("encode content")?;
    Ok(sha256::digest(bytes.as_slice()))
}
