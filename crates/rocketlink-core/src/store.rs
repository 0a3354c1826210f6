//! Time-indexed rocket telemetry store.
//!
//! Every value is filed twice: by timestamp (the timeset, used for the CSV
//! projection) and by `(address, field)` (the keyset, used for lookups and
//! time series). Both views and the per-device altitude maximum live under
//! one lock so readers always see a complete insert. Change callbacks are
//! kept under a separate lock and run after both are released.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rocketlink_packet::{Bundle, DataEntryId, DataValue, DeviceType};
use tracing::{debug, trace};

use crate::device_manager::DeviceManager;
use crate::error::StoreError;
use crate::transport::FullAddress;

/// Called with the new value and its timestamp after each insert.
pub type StoreCallback = Arc<dyn Fn(&DataValue, u32) + Send + Sync>;

type Key = (FullAddress, DataEntryId);

#[derive(Default)]
struct StoreInner {
    last_time: Option<u32>,
    timeset: BTreeMap<u32, HashMap<Key, DataValue>>,
    keyset: HashMap<Key, BTreeMap<u32, DataValue>>,
    max_altitude: HashMap<FullAddress, f32>,
}

/// Consistent copy of the timeset.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub rows: BTreeMap<u32, HashMap<(FullAddress, DataEntryId), DataValue>>,
}

impl Snapshot {
    /// Every address with at least one value, sorted.
    pub fn addresses(&self) -> BTreeSet<FullAddress> {
        self.rows
            .values()
            .flat_map(|row| row.keys().map(|(address, _)| address.clone()))
            .collect()
    }
}

/// The rocket data store.
pub struct RocketData {
    devices: Arc<DeviceManager>,
    inner: RwLock<StoreInner>,
    callbacks: Mutex<HashMap<(DeviceType, DataEntryId), Vec<StoreCallback>>>,
}

impl RocketData {
    pub fn new(devices: Arc<DeviceManager>) -> Self {
        RocketData {
            devices,
            inner: RwLock::new(StoreInner::default()),
            callbacks: Mutex::new(HashMap::new()),
        }
    }

    /// Insert every value of `bundle` under `address`.
    ///
    /// Values are stamped with the bundle's `TIME`, or with the most recent
    /// time seen by the store when the bundle has none. Callbacks registered
    /// for the address's device type fire after the insert is visible.
    pub fn add_bundle(&self, address: &FullAddress, bundle: Bundle) {
        let mut affected = Vec::with_capacity(bundle.len());
        let time = {
            let mut inner = self.inner.write();
            let time = match bundle.time() {
                Some(time) => {
                    inner.last_time = Some(time);
                    time
                }
                None => inner.last_time.unwrap_or(0),
            };

            if let Some(altitude) = bundle.calculated_altitude() {
                let max = inner.max_altitude.entry(address.clone()).or_insert(altitude);
                *max = max.max(altitude);
            }

            let row = inner.timeset.entry(time).or_default();
            for (id, value) in &bundle {
                row.insert((address.clone(), *id), value.clone());
            }
            for (id, value) in bundle {
                inner
                    .keyset
                    .entry((address.clone(), id))
                    .or_default()
                    .insert(time, value.clone());
                affected.push((id, value));
            }
            time
        };
        trace!(%address, time, fields = affected.len(), "bundle stored");

        let Some(device_type) = self.devices.get_device_type(address) else {
            return;
        };
        for (id, value) in affected {
            let callbacks = self
                .callbacks
                .lock()
                .get(&(device_type, id))
                .cloned()
                .unwrap_or_default();
            for callback in callbacks {
                callback(&value, time);
            }
        }
    }

    /// Most recent value of `id` for `device_type`.
    pub fn last_value(&self, device_type: DeviceType, id: DataEntryId) -> Option<DataValue> {
        self.last_entry(device_type, id).map(|(_, value)| value)
    }

    /// Most recent `(time, value)` of `id` for `device_type`.
    pub fn last_entry(&self, device_type: DeviceType, id: DataEntryId) -> Option<(u32, DataValue)> {
        let address = self.devices.get_full_address(device_type)?;
        let inner = self.inner.read();
        let (time, value) = inner.keyset.get(&(address, id))?.last_key_value()?;
        Some((*time, value.clone()))
    }

    /// Every `(time, value)` of `id` for `device_type`, in time order.
    pub fn time_series(&self, device_type: DeviceType, id: DataEntryId) -> Option<(Vec<u32>, Vec<DataValue>)> {
        let address = self.devices.get_full_address(device_type)?;
        let inner = self.inner.read();
        let series = inner.keyset.get(&(address, id))?;
        Some(series.iter().map(|(time, value)| (*time, value.clone())).unzip())
    }

    /// Highest calculated altitude seen from `device_type`.
    pub fn highest_altitude(&self, device_type: DeviceType) -> Option<f32> {
        let address = self.devices.get_full_address(device_type)?;
        self.inner.read().max_altitude.get(&address).copied()
    }

    /// Register `callback` for new values of `id` from `device_type`.
    ///
    /// Callbacks run on the inserting thread and must not block.
    pub fn register_callback<F>(&self, device_type: DeviceType, id: DataEntryId, callback: F)
    where
        F: Fn(&DataValue, u32) + Send + Sync + 'static,
    {
        self.callbacks
            .lock()
            .entry((device_type, id))
            .or_default()
            .push(Arc::new(callback));
    }

    /// Most recent timestamp seen by the store.
    pub fn last_time(&self) -> Option<u32> {
        self.inner.read().last_time
    }

    /// Every address with stored values, sorted.
    pub fn addresses(&self) -> Vec<FullAddress> {
        let inner = self.inner.read();
        let addresses: BTreeSet<_> = inner.keyset.keys().map(|(address, _)| address.clone()).collect();
        addresses.into_iter().collect()
    }

    /// Number of stored values of `id` for `device_type`.
    pub fn len(&self, device_type: DeviceType, id: DataEntryId) -> usize {
        let Some(address) = self.devices.get_full_address(device_type) else {
            return 0;
        };
        self.inner
            .read()
            .keyset
            .get(&(address, id))
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().timeset.is_empty()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            rows: self.inner.read().timeset.clone(),
        }
    }

    /// Write the CSV projection of the store to `path`.
    ///
    /// The file is written next to `path` and renamed into place, so readers
    /// never see a partial file. Returns the number of data rows.
    pub fn save(&self, path: &Path) -> Result<usize, StoreError> {
        let snapshot = self.snapshot();
        let tmp = temp_path(path);
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            write_csv(&mut writer, &snapshot, |address| self.label(address))?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), rows = snapshot.rows.len(), "store saved");
        Ok(snapshot.rows.len())
    }

    /// Column label for an address: the device type name when registered,
    /// `transport:device` otherwise so equal hwids on two links stay apart.
    fn label(&self, address: &FullAddress) -> String {
        match self.devices.get_device_type(address) {
            Some(device_type) => device_type.name().to_string(),
            None => address.to_string(),
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `snapshot` as CSV.
///
/// One column per `(label, field)` pair sorted by label then field, with a
/// `TIME` column for every label. One row per timestamp.
pub fn write_csv<W, L>(writer: &mut csv::Writer<W>, snapshot: &Snapshot, label: L) -> Result<(), StoreError>
where
    W: std::io::Write,
    L: Fn(&FullAddress) -> String,
{
    let labels: HashMap<FullAddress, String> = snapshot
        .addresses()
        .into_iter()
        .map(|address| {
            let name = label(&address);
            (address, name)
        })
        .collect();

    let mut columns: BTreeSet<(String, DataEntryId)> = BTreeSet::new();
    for row in snapshot.rows.values() {
        for (address, id) in row.keys() {
            let name = labels[address].clone();
            columns.insert((name.clone(), DataEntryId::Time));
            columns.insert((name, *id));
        }
    }
    let columns: Vec<_> = columns.into_iter().collect();
    let index: HashMap<&(String, DataEntryId), usize> =
        columns.iter().enumerate().map(|(i, c)| (c, i)).collect();

    writer.write_record(columns.iter().map(|(name, id)| format!("{}_{}", id.as_str(), name)))?;

    for (time, row) in &snapshot.rows {
        let mut cells = vec![String::new(); columns.len()];
        for ((address, id), value) in row {
            let name = &labels[address];
            cells[index[&(name.clone(), DataEntryId::Time)]] = time.to_string();
            if *id != DataEntryId::Time {
                cells[index[&(name.clone(), *id)]] = value.to_string();
            }
        }
        writer.write_record(&cells)?;
    }
    Ok(())
}
