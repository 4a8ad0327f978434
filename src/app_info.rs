//! Process-wide application identity.
//!
//! The name and version reported to the driver when the Vulkan instance is
//! created. Readers take a shared lock and get a consistent snapshot; the
//! setter takes the exclusive lock. Call [`init`] once at startup; until
//! then readers see [`AppInfo::default`].

use parking_lot::RwLock;
use std::fmt;
use thiserror::Error;

/// Largest major version (10 bits).
pub const MAJOR_MAX: u16 = 0x3ff;
/// Largest minor version (10 bits).
pub const MINOR_MAX: u16 = 0x3ff;
/// Largest patch version (12 bits).
pub const PATCH_MAX: u16 = 0xfff;

/// Version of this crate, reported as the engine version.
pub const ENGINE_VERSION: AppVersion = AppVersion {
    major: 0,
    minor: 1,
    patch: 0,
};

static APP_INFO: RwLock<Option<AppInfo>> = RwLock::new(None);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppInfoError {
    #[error("{field} version {value} is out of range (max {max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        max: u16,
    },
}

/// A 10/10/12-bit major/minor/patch triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppVersion {
    major: u16,
    minor: u16,
    patch: u16,
}

impl AppVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Result<Self, AppInfoError> {
        Ok(Self {
            major: check("major", major, MAJOR_MAX)?,
            minor: check("minor", minor, MINOR_MAX)?,
            patch: check("patch", patch, PATCH_MAX)?,
        })
    }

    pub fn major(self) -> u16 {
        self.major
    }

    pub fn minor(self) -> u16 {
        self.minor
    }

    pub fn patch(self) -> u16 {
        self.patch
    }

    /// Pack as `major << 22 | minor << 12 | patch`, the layout of the
    /// driver's application and engine version fields.
    pub fn packed(self) -> u32 {
        (u32::from(self.major) << 22) | (u32::from(self.minor) << 12) | u32::from(self.patch)
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn check(field: &'static str, value: u32, max: u16) -> Result<u16, AppInfoError> {
    match u16::try_from(value) {
        Ok(v) if v <= max => Ok(v),
        _ => Err(AppInfoError::OutOfRange { field, value, max }),
    }
}

/// Application name and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub name: String,
    pub version: AppVersion,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: "clearframe".to_string(),
            version: ENGINE_VERSION,
        }
    }
}

/// Install the application identity. Intended to be called once at startup.
pub fn init(info: AppInfo) {
    log::debug!("Application info: {} {}", info.name, info.version);
    set(info);
}

/// Replace the application identity.
pub fn set(info: AppInfo) {
    *APP_INFO.write() = Some(info);
}

/// Snapshot of the current application identity.
pub fn get() -> AppInfo {
    APP_INFO.read().clone().unwrap_or_default()
}

pub fn name() -> String {
    APP_INFO
        .read()
        .as_ref()
        .map_or_else(|| AppInfo::default().name, |info| info.name.clone())
}

pub fn version() -> AppVersion {
    APP_INFO
        .read()
        .as_ref()
        .map_or(ENGINE_VERSION, |info| info.version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::thread;

    // Tests share the process-wide store.
    static STORE: Mutex<()> = Mutex::new(());

    #[test]
    fn version_bounds_are_inclusive() {
        assert!(AppVersion::new(1023, 1023, 4095).is_ok());
        assert!(AppVersion::new(0, 0, 0).is_ok());

        assert_eq!(
            AppVersion::new(1024, 0, 0),
            Err(AppInfoError::OutOfRange {
                field: "major",
                value: 1024,
                max: MAJOR_MAX
            })
        );
        assert!(AppVersion::new(0, 1024, 0).is_err());
        assert!(AppVersion::new(0, 0, 4096).is_err());
        assert!(AppVersion::new(0, 0, u32::MAX).is_err());
    }

    #[test]
    fn packing_matches_driver_layout() {
        let v = AppVersion::new(1, 2, 3).unwrap();
        assert_eq!(v.packed(), (1 << 22) | (2 << 12) | 3);

        let max = AppVersion::new(1023, 1023, 4095).unwrap();
        assert_eq!(max.packed(), u32::MAX);
    }

    #[test]
    fn set_then_get_round_trips() {
        let _guard = STORE.lock();

        for (major, minor, patch) in [(0, 0, 0), (1023, 1023, 4095), (3, 14, 159)] {
            let info = AppInfo {
                name: format!("app-{major}-{minor}-{patch}"),
                version: AppVersion::new(major, minor, patch).unwrap(),
            };
            set(info.clone());

            assert_eq!(get(), info);
            assert_eq!(name(), info.name);
            assert_eq!(version().major(), major as u16);
            assert_eq!(version().minor(), minor as u16);
            assert_eq!(version().patch(), patch as u16);
        }
    }

    #[test]
    fn readers_see_whole_snapshots() {
        let _guard = STORE.lock();
        let a = AppInfo {
            name: "alpha".into(),
            version: AppVersion::new(1, 1, 1).unwrap(),
        };
        let b = AppInfo {
            name: "beta".into(),
            version: AppVersion::new(2, 2, 2).unwrap(),
        };
        set(a.clone());

        let expected = Arc::new([a.clone(), b.clone()]);
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let expected = Arc::clone(&expected);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let snapshot = get();
                        assert!(expected.contains(&snapshot), "torn read: {snapshot:?}");
                    }
                })
            })
            .collect();

        for i in 0..1000 {
            set(if i % 2 == 0 { b.clone() } else { a.clone() });
        }
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn display_is_dotted() {
        assert_eq!(AppVersion::new(4, 5, 6).unwrap().to_string(), "4.5.6");
    }
}
