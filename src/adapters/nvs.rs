//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for the node.  The configuration is stored as
//! a single postcard blob under `tempnode::nodecfg`.
//!
//! - Config validation: all fields are range-checked before persistence.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//! - NVS flash initialisation is also a prerequisite of the BLE host stack,
//!   so [`NvsAdapter::new`] runs before the radio is brought up.

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::NodeConfig;
use log::{info, warn};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE: &[u8] = b"tempnode\0";
#[cfg(target_os = "espidf")]
const CONFIG_KEY: &[u8] = b"nodecfg\0";

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 256;

/// Legal advertising interval range accepted by the controller
/// (units of 0.625 ms).
const ADV_INTERVAL_RANGE: core::ops::RangeInclusive<u16> = 0x0010..=0x4000;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    blob: std::cell::RefCell<Option<Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32
                || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32
            {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as i32 {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            blob: std::cell::RefCell::new(None),
        })
    }

    /// Open the config namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        // SAFETY: namespace is NUL-terminated; handle is closed below.
        let ret = unsafe { nvs_open(CONFIG_NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

/// Range-check every field.  Invalid values are rejected, never clamped.
pub fn validate_config(cfg: &NodeConfig) -> Result<(), ConfigError> {
    if cfg.short_press_max_ms == 0 {
        return Err(ConfigError::ValidationFailed("short_press_max_ms must be > 0"));
    }
    if cfg.medium_press_max_ms <= cfg.short_press_max_ms {
        return Err(ConfigError::ValidationFailed(
            "medium_press_max_ms must be > short_press_max_ms",
        ));
    }
    if !(1..=100).contains(&cfg.debounce_settle_ms) {
        return Err(ConfigError::ValidationFailed("debounce_settle_ms must be 1–100"));
    }
    if cfg.sleep_cycle_ms < 1_000 {
        return Err(ConfigError::ValidationFailed("sleep_cycle_ms must be >= 1000"));
    }
    if cfg.idle_timeout_ms < 1_000 {
        return Err(ConfigError::ValidationFailed("idle_timeout_ms must be >= 1000"));
    }
    if !(10..=10_000).contains(&cfg.data_broadcast_ms) {
        return Err(ConfigError::ValidationFailed("data_broadcast_ms must be 10–10000"));
    }
    if !ADV_INTERVAL_RANGE.contains(&cfg.adv_interval_min)
        || !ADV_INTERVAL_RANGE.contains(&cfg.adv_interval_max)
    {
        return Err(ConfigError::ValidationFailed(
            "adv_interval_min/max must be 0x0010–0x4000",
        ));
    }
    if cfg.adv_interval_min > cfg.adv_interval_max {
        return Err(ConfigError::ValidationFailed(
            "adv_interval_min must be <= adv_interval_max",
        ));
    }
    if cfg.register_blink_ms == 0 || cfg.delete_blink_ms == 0 {
        return Err(ConfigError::ValidationFailed("blink periods must be > 0"));
    }
    Ok(())
}

/// Decode a stored blob, falling back to defaults when it no longer
/// validates (e.g. written by an older build with different limits).
fn decode_config(bytes: &[u8]) -> Result<NodeConfig, ConfigError> {
    let cfg: NodeConfig = postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
    if let Err(e) = validate_config(&cfg) {
        warn!("NvsAdapter: stored config rejected ({}), using defaults", e);
        return Ok(NodeConfig::default());
    }
    Ok(cfg)
}

/// Load the stored config. A blob that no longer decodes is overwritten with
/// the defaults so the next boot starts clean.
pub fn load_or_reset(store: &impl ConfigPort) -> NodeConfig {
    match store.load() {
        Ok(cfg) => cfg,
        Err(ConfigError::Corrupted) => {
            warn!("NvsAdapter: stored config corrupted, rewriting defaults");
            let cfg = NodeConfig::default();
            if let Err(e) = store.save(&cfg) {
                warn!("NvsAdapter: could not rewrite defaults ({})", e);
            }
            cfg
        }
        Err(e) => {
            warn!("NvsAdapter: config unavailable ({}), using defaults", e);
            NodeConfig::default()
        }
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<NodeConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            if let Some(bytes) = self.blob.borrow().as_deref() {
                let cfg = decode_config(bytes)?;
                info!("NvsAdapter: loaded config from store");
                Ok(cfg)
            } else {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(NodeConfig::default())
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(false, |handle| {
                let mut buf = [0u8; MAX_BLOB_SIZE];
                let mut size: usize = buf.len();
                // SAFETY: key is NUL-terminated; `size` bounds the write.
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        CONFIG_KEY.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok((buf, size))
            });

            match result {
                Ok((buf, size)) => {
                    let cfg = decode_config(&buf[..size])?;
                    info!("NvsAdapter: loaded config from NVS ({} bytes)", size);
                    Ok(cfg)
                }
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => {
                    info!("NvsAdapter: no stored config, using defaults");
                    Ok(NodeConfig::default())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS read error {}, using defaults", e);
                    Ok(NodeConfig::default())
                }
            }
        }
    }

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            *self.blob.borrow_mut() = Some(bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(true, |handle| {
                // SAFETY: key is NUL-terminated; blob pointer/len from a live Vec.
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        CONFIG_KEY.as_ptr() as *const _,
                        bytes.as_ptr() as *const _,
                        bytes.len(),
                    )
                };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        assert!(validate_config(&NodeConfig::default()).is_ok());
    }

    #[test]
    fn rejects_unordered_press_thresholds() {
        let cfg = NodeConfig {
            short_press_max_ms: 5000,
            medium_press_max_ms: 5000,
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn rejects_zero_short_threshold() {
        let cfg = NodeConfig {
            short_press_max_ms: 0,
            ..Default::default()
        };
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_settle_out_of_range() {
        for settle in [0, 101] {
            let cfg = NodeConfig {
                debounce_settle_ms: settle,
                ..Default::default()
            };
            assert!(validate_config(&cfg).is_err(), "settle={settle}");
        }
    }

    #[test]
    fn rejects_inverted_adv_interval() {
        let cfg = NodeConfig {
            adv_interval_min: 0x40,
            adv_interval_max: 0x20,
            ..Default::default()
        };
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_short_sleep_cycle() {
        let cfg = NodeConfig {
            sleep_cycle_ms: 999,
            ..Default::default()
        };
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn save_then_load_round_trip() {
        let nvs = NvsAdapter::new().unwrap();
        let cfg = NodeConfig {
            sleep_cycle_ms: 60_000,
            idle_timeout_ms: 10_000,
            ..Default::default()
        };
        nvs.save(&cfg).unwrap();
        assert_eq!(nvs.load().unwrap(), cfg);
    }

    #[test]
    fn load_without_blob_gives_defaults() {
        let nvs = NvsAdapter::new().unwrap();
        assert_eq!(nvs.load().unwrap(), NodeConfig::default());
    }

    #[test]
    fn invalid_config_is_not_persisted() {
        let nvs = NvsAdapter::new().unwrap();
        let bad = NodeConfig {
            delete_blink_ms: 0,
            ..Default::default()
        };
        assert!(nvs.save(&bad).is_err());
        assert_eq!(nvs.load().unwrap(), NodeConfig::default());
    }

    #[test]
    fn corrupted_blob_is_reported() {
        let nvs = NvsAdapter::new().unwrap();
        *nvs.blob.borrow_mut() = Some(vec![0xFF; 3]);
        assert_eq!(nvs.load(), Err(ConfigError::Corrupted));
    }

    #[test]
    fn corrupted_blob_is_replaced_by_defaults() {
        let nvs = NvsAdapter::new().unwrap();
        *nvs.blob.borrow_mut() = Some(vec![0xFF; 3]);
        assert_eq!(load_or_reset(&nvs), NodeConfig::default());
        assert_eq!(nvs.load(), Ok(NodeConfig::default()));
        assert!(nvs.blob.borrow().is_some());
    }

    #[test]
    fn stored_config_survives_load_or_reset() {
        let nvs = NvsAdapter::new().unwrap();
        let cfg = NodeConfig {
            idle_timeout_ms: 5_000,
            ..Default::default()
        };
        nvs.save(&cfg).unwrap();
        assert_eq!(load_or_reset(&nvs), cfg);
    }
}
