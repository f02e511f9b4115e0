use uuid::Uuid;

/// Tenant seeded by the initial migration; the master API key acts on it.
pub const DEFAULT_TENANT_ID: Uuid = Uuid::from_u128(0xd2e8f4a1_7b3c_5d6e_8f9a_0b1c2d3e4f5a);

/// User id recorded for requests authenticated with the master API key.
pub const DEFAULT_USER_ID: Uuid = Uuid::from_u128(0x3f1a9c7e_2b4d_4e6f_8a0b_1c2d3e4f5a6b);

/// Prefix of an embedded file reference token (`files:<uuid>`).
pub const FILE_TOKEN_PREFIX: &str = "files:";

/// Maximum page size for list endpoints.
pub const MAX_PAGE_SIZE: i64 = 100;
