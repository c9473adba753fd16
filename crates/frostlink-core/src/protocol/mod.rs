//! Protocol module: provisioning text frames, broker payload decoding, and
//! the fixed short-range service/characteristic identifiers.

pub mod fragment;
pub mod telemetry;

use uuid::Uuid;

/// Service holding the credential write characteristic on the appliance.
pub const CREDENTIAL_SERVICE: Uuid = Uuid::from_u128(0x19b10000_e8f2_537e_4f6c_d104768a1214);

/// Characteristic the network name and passphrase are written to.
pub const CREDENTIAL_CHARACTERISTIC: Uuid = Uuid::from_u128(0x19b10001_e8f2_537e_4f6c_d104768a1214);

/// Service carrying the provisioning notification stream.
pub const PROVISION_SERVICE: Uuid = Uuid::from_u128(0x0000ff01_0000_1000_8000_00805f9b34fb);

/// Characteristic the `FIELD:value` frames are notified on.
pub const PROVISION_CHARACTERISTIC: Uuid = Uuid::from_u128(0x0000ff02_0000_1000_8000_00805f9b34fb);
