use bizdesk_api::auth::{JwtService, UserRole};
use bizdesk_db::TenantRepository;
use uuid::Uuid;

pub const TEST_MASTER_API_KEY: &str = "test-master-api-key-at-least-32-characters-long";

pub const TEST_JWT_SECRET: &str = "test-secret-key-min-32-characters-long-for-testing";

/// Signed token for a fresh user of `tenant_id`.
pub fn token_for(tenant_id: Uuid, role: UserRole) -> String {
    JwtService::new(TEST_JWT_SECRET, 1)
        .issue(Uuid::new_v4(), tenant_id, role)
        .expect("Failed to sign test token")
}

pub async fn create_test_tenant(pool: &sqlx::PgPool, name: &str) -> Uuid {
    TenantRepository::new(pool.clone())
        .create(name)
        .await
        .expect("Failed to create test tenant")
        .id
}

pub async fn suspend_tenant(pool: &sqlx::PgPool, tenant_id: Uuid) {
    sqlx::query("UPDATE tenants SET status = 'suspended' WHERE id = $1")
        .bind(tenant_id)
        .execute(pool)
        .await
        .expect("Failed to suspend tenant");
}
