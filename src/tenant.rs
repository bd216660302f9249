use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::compactor;
use crate::engine::Engine;
use crate::limits::*;

/// Manages per-tenant engines. Each tenant gets its own Engine, WAL and
/// compactor. Tenant = database name from the pgwire connection.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            compact_threshold,
        }
    }

    /// Get or lazily create an engine for the given tenant.
    pub fn get_or_create(&self, tenant: &str) -> std::io::Result<Arc<Engine>> {
        if let Some(engine) = self.engines.get(tenant) {
            return Ok(engine.value().clone());
        }
        if tenant.len() > MAX_TENANT_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "tenant name too long",
            ));
        }

        // Keep the name usable as a file name.
        let safe_name: String = tenant
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty tenant name",
            ));
        }

        if self.tenant_count() >= MAX_TENANTS {
            return Err(std::io::Error::other("too many tenants"));
        }

        // The entry lock keeps two first connections from opening one WAL twice.
        let engine = match self.engines.entry(tenant.to_string()) {
            Entry::Occupied(e) => return Ok(e.get().clone()),
            Entry::Vacant(e) => {
                let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
                let engine = Arc::new(Engine::new(wal_path)?);
                e.insert(engine.clone());
                engine
            }
        };

        let compactor_engine = engine.clone();
        let threshold = self.compact_threshold;
        tokio::spawn(async move {
            compactor::run_compactor(compactor_engine, threshold).await;
        });

        let tenants = self.tenant_count();
        tracing::info!(tenant, tenants, "tenant loaded");
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(tenants as f64);
        Ok(engine)
    }

    pub fn tenant_count(&self) -> usize {
        self.engines.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use chrono::NaiveDate;
    use std::fs;
    use ulid::Ulid;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("innkeep_test_tenant").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn day(s: &str) -> Day {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn rates(base: i64) -> RoomRateConfig {
        RoomRateConfig {
            base_price: Money::from(base),
            ..RoomRateConfig::default()
        }
    }

    #[tokio::test]
    async fn tenant_isolation() {
        let dir = test_data_dir("isolation");
        let tm = TenantManager::new(dir, 1000);

        let eng_a = tm.get_or_create("tenant_a").unwrap();
        let eng_b = tm.get_or_create("tenant_b").unwrap();

        // Same room id in both marketplaces, priced differently.
        let room_id = Ulid::new();
        let hotel_id = Ulid::new();
        eng_a.create_room(room_id, hotel_id, None, rates(1000)).await.unwrap();
        eng_b.create_room(room_id, hotel_id, None, rates(80)).await.unwrap();

        let booking = NewBooking {
            id: Ulid::new(),
            room_id,
            unit_id: None,
            check_in: day("2024-01-01"),
            check_out: day("2024-01-03"),
            status: BookingStatus::Confirmed,
            coupon: None,
        };
        eng_a.create_booking(booking).await.unwrap();

        let avail_a = eng_a
            .check_availability(room_id, None, day("2024-01-02"), day("2024-01-04"))
            .await
            .unwrap();
        assert!(!avail_a.is_available());
        let avail_b = eng_b
            .check_availability(room_id, None, day("2024-01-02"), day("2024-01-04"))
            .await
            .unwrap();
        assert!(avail_b.is_available());

        let quote_b = eng_b
            .quote(room_id, day("2024-01-01"), day("2024-01-03"), None)
            .await
            .unwrap();
        assert_eq!(quote_b.total, Money::from(160));
    }

    #[tokio::test]
    async fn tenant_lazy_creation() {
        let dir = test_data_dir("lazy");
        let tm = TenantManager::new(dir.clone(), 1000);

        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert!(entries.is_empty());

        let _eng = tm.get_or_create("my_db").unwrap();
        assert!(dir.join("my_db.wal").exists());
        assert_eq!(tm.tenant_count(), 1);
    }

    #[tokio::test]
    async fn tenant_same_engine_returned() {
        let dir = test_data_dir("same_eng");
        let tm = TenantManager::new(dir, 1000);

        let eng1 = tm.get_or_create("foo").unwrap();
        let eng2 = tm.get_or_create("foo").unwrap();
        assert!(Arc::ptr_eq(&eng1, &eng2));
    }

    #[tokio::test]
    async fn tenant_name_sanitized() {
        let dir = test_data_dir("sanitize");
        let tm = TenantManager::new(dir.clone(), 1000);

        let _eng = tm.get_or_create("../evil").unwrap();
        assert!(dir.join("evil.wal").exists());

        let result = tm.get_or_create("../..");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn tenant_name_too_long() {
        let dir = test_data_dir("name_too_long");
        let tm = TenantManager::new(dir, 1000);

        let long_name = "x".repeat(MAX_TENANT_NAME_LEN + 1);
        let err = tm.get_or_create(&long_name).err().unwrap();
        assert!(err.to_string().contains("tenant name too long"));
    }

    #[tokio::test]
    async fn tenant_state_survives_restart() {
        let dir = test_data_dir("restart");
        let room_id = Ulid::new();
        {
            let tm = TenantManager::new(dir.clone(), 1000);
            let eng = tm.get_or_create("hotels").unwrap();
            eng.create_room(room_id, Ulid::new(), Some("Suite".into()), rates(250))
                .await
                .unwrap();
        }

        let tm = TenantManager::new(dir, 1000);
        let eng = tm.get_or_create("hotels").unwrap();
        let rooms = eng.list_rooms().await;
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].id, room_id);
        assert_eq!(rooms[0].name.as_deref(), Some("Suite"));
    }

    #[tokio::test]
    async fn tenant_count_limit() {
        let dir = test_data_dir("count_limit");
        let tm = TenantManager::new(dir, 1000);

        for i in 0..MAX_TENANTS {
            tm.get_or_create(&format!("t{i}")).unwrap();
        }
        let err = tm.get_or_create("one_more").err().unwrap();
        assert!(err.to_string().contains("too many tenants"));
    }
}
