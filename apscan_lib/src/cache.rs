/** ------------------------------------------------------------
 * Access point cache: per-BSSID sample history across scan cycles.
 * ------------------------------------------------------------- */
use crate::record::{Bssid, NetworkSample};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Per access point sample cap when none is configured.
pub const DEFAULT_MAX_HISTORY: usize = 1024;

/**
 * Display color of an access point
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

pub const AP_PALETTE: [Rgb; 12] = [
    Rgb::new(47, 255, 5),
    Rgb::new(36, 170, 231),
    Rgb::new(252, 253, 50),
    Rgb::new(253, 153, 51),
    Rgb::new(101, 205, 252),
    Rgb::new(150, 50, 206),
    Rgb::new(99, 206, 49),
    Rgb::new(31, 101, 199),
    Rgb::new(253, 102, 55),
    Rgb::new(204, 255, 105),
    Rgb::new(252, 52, 255),
    Rgb::new(148, 255, 255),
];

/**
 * Round-robin palette allocator
 *
 * Colors are never returned to the pool; the counter only restarts on
 * `reset`.
 */
#[derive(Debug, Clone, Default)]
pub struct ColorAllocator {
    next: usize,
}

impl ColorAllocator {
    pub fn next_color(&mut self) -> Rgb {
        let color = AP_PALETTE[self.next];
        self.next = (self.next + 1) % AP_PALETTE.len();
        color
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

/**
 * Signal statistics over an access point's retained history
 */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RssiStats {
    pub count: usize,
    pub min: i32,
    pub max: i32,
    pub mean: f64,
}

/**
 * One access point and its time-ordered sample history
 */
#[derive(Debug, Clone)]
pub struct AccessPoint {
    bssid: Bssid,
    color: Rgb,
    pub graph: bool,
    pub highlight: bool,
    history: VecDeque<NetworkSample>,
}

impl AccessPoint {
    fn new(bssid: Bssid, color: Rgb) -> Self {
        Self {
            bssid,
            color,
            graph: true,
            highlight: false,
            history: VecDeque::new(),
        }
    }

    pub fn bssid(&self) -> Bssid {
        self.bssid
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    /// Samples, oldest first.
    pub fn history(&self) -> &VecDeque<NetworkSample> {
        &self.history
    }

    pub fn latest(&self) -> Option<&NetworkSample> {
        self.history.back()
    }

    /// SSID of the newest sample; empty once the history is pruned away.
    pub fn ssid(&self) -> &str {
        self.latest().map_or("", |sample| sample.ssid.as_str())
    }

    pub fn is_connected(&self) -> bool {
        self.latest().is_some_and(|sample| sample.connected)
    }

    pub fn samples_since(&self, cutoff: DateTime<Utc>) -> Vec<NetworkSample> {
        let start = self.history.partition_point(|s| s.timestamp < cutoff);
        self.history.range(start..).cloned().collect()
    }

    pub fn rssi_stats(&self) -> Option<RssiStats> {
        let count = self.history.len();
        if count == 0 {
            return None;
        }

        let (mut min, mut max, mut sum) = (i32::MAX, i32::MIN, 0i64);
        for sample in &self.history {
            min = min.min(sample.rssi_dbm);
            max = max.max(sample.rssi_dbm);
            sum += sample.rssi_dbm as i64;
        }
        Some(RssiStats {
            count,
            min,
            max,
            mean: sum as f64 / count as f64,
        })
    }

    /// Insert keeping ascending time order, then drop the oldest beyond `cap`.
    fn record(&mut self, sample: NetworkSample, cap: usize) {
        match self.history.back() {
            Some(last) if last.timestamp > sample.timestamp => {
                let at = self
                    .history
                    .partition_point(|s| s.timestamp <= sample.timestamp);
                self.history.insert(at, sample);
            }
            _ => self.history.push_back(sample),
        }

        while self.history.len() > cap {
            self.history.pop_front();
        }
    }

    fn prune_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let stale = self.history.partition_point(|s| s.timestamp < cutoff);
        self.history.drain(..stale);
        stale
    }
}

/**
 * Outcome of a merge
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub samples: usize,
    pub new_access_points: usize,
}

/**
 * Keyed store of access points in first-sighting order
 */
#[derive(Debug, Clone)]
pub struct AccessPointCache {
    access_points: Vec<AccessPoint>,
    index: HashMap<Bssid, usize>,
    newest: Option<DateTime<Utc>>,
    colors: ColorAllocator,
    max_history: usize,
}

/// The cache as shared between the scan loop and its readers.
pub type SharedCache = Arc<RwLock<AccessPointCache>>;

impl Default for AccessPointCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl AccessPointCache {
    pub fn new(max_history: usize) -> Self {
        Self {
            access_points: Vec::new(),
            index: HashMap::new(),
            newest: None,
            colors: ColorAllocator::default(),
            max_history: max_history.max(1),
        }
    }

    pub fn shared(self) -> SharedCache {
        Arc::new(RwLock::new(self))
    }

    /**
     * Append samples to their access points, creating access points on
     * first sighting, and advance the newest-timestamp watermark.
     */
    pub fn merge<I>(&mut self, samples: I) -> MergeSummary
    where
        I: IntoIterator<Item = NetworkSample>,
    {
        let mut summary = MergeSummary::default();

        for sample in samples {
            let slot = match self.index.get(&sample.bssid) {
                Some(&slot) => slot,
                None => {
                    let slot = self.access_points.len();
                    let color = self.colors.next_color();
                    self.access_points.push(AccessPoint::new(sample.bssid, color));
                    self.index.insert(sample.bssid, slot);
                    summary.new_access_points += 1;
                    tracing::debug!(bssid = %sample.bssid, ssid = %sample.ssid, "new access point");
                    slot
                }
            };

            self.newest = self.newest.max(Some(sample.timestamp));
            self.access_points[slot].record(sample, self.max_history);
            summary.samples += 1;
        }

        summary
    }

    /**
     * Drop samples strictly older than `cutoff`. Access points stay, even
     * with an empty history.
     */
    pub fn prune_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let removed: usize = self
            .access_points
            .iter_mut()
            .map(|ap| ap.prune_older_than(cutoff))
            .sum();
        if removed > 0 {
            tracing::trace!(removed, %cutoff, "pruned samples");
        }
        removed
    }

    /// Snapshot of all access points in first-sighting order.
    pub fn access_points(&self) -> Vec<AccessPoint> {
        self.access_points.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccessPoint> {
        self.access_points.iter()
    }

    pub fn get(&self, bssid: &Bssid) -> Option<&AccessPoint> {
        self.index.get(bssid).map(|&slot| &self.access_points[slot])
    }

    /// Samples of one access point from `cutoff` on; empty if unknown.
    pub fn samples_since(&self, bssid: &Bssid, cutoff: DateTime<Utc>) -> Vec<NetworkSample> {
        self.get(bssid)
            .map(|ap| ap.samples_since(cutoff))
            .unwrap_or_default()
    }

    /// The access point whose newest sample is flagged connected.
    pub fn connected(&self) -> Option<&AccessPoint> {
        self.access_points.iter().find(|ap| ap.is_connected())
    }

    pub fn len(&self) -> usize {
        self.access_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.access_points.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.access_points.iter().map(|ap| ap.history.len()).sum()
    }

    pub fn newest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.newest
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn set_graph(&mut self, bssid: &Bssid, graph: bool) -> bool {
        self.get_mut(bssid).map(|ap| ap.graph = graph).is_some()
    }

    pub fn set_highlight(&mut self, bssid: &Bssid, highlight: bool) -> bool {
        self.get_mut(bssid).map(|ap| ap.highlight = highlight).is_some()
    }

    /// Forget every access point, the watermark, and the color sequence.
    pub fn reset(&mut self) {
        self.access_points.clear();
        self.index.clear();
        self.newest = None;
        self.colors.reset();
    }

    fn get_mut(&mut self, bssid: &Bssid) -> Option<&mut AccessPoint> {
        let slot = *self.index.get(bssid)?;
        self.access_points.get_mut(slot)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::record::NetworkType;
    use chrono::TimeZone;

    pub(crate) fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    pub(crate) fn sample(last_octet: u8, secs: i64, rssi_dbm: i32) -> NetworkSample {
        NetworkSample {
            bssid: Bssid([0x02, 0, 0, 0, 0, last_octet]),
            ssid: format!("ap{last_octet}"),
            channel: 6,
            rssi_dbm,
            rates: vec![1.0, 2.0, 5.5, 11.0],
            is_high_throughput: false,
            security: "Open".to_string(),
            network_type: NetworkType::Infrastructure,
            connected: false,
            timestamp: at(secs),
        }
    }

    #[test]
    fn same_bssid_is_one_access_point() {
        let mut cache = AccessPointCache::default();
        let summary = cache.merge([sample(1, 0, -60), sample(1, 5, -62)]);

        assert_eq!(
            summary,
            MergeSummary {
                samples: 2,
                new_access_points: 1
            }
        );
        assert_eq!(cache.len(), 1);
        let ap = cache.get(&Bssid([0x02, 0, 0, 0, 0, 1])).unwrap();
        let times: Vec<_> = ap.history().iter().map(|s| s.timestamp).collect();
        assert_eq!(times, vec![at(0), at(5)]);
        assert_eq!(cache.newest_timestamp(), Some(at(5)));
    }

    #[test]
    fn out_of_order_samples_are_sorted() {
        let mut cache = AccessPointCache::default();
        cache.merge([sample(1, 10, -60), sample(1, 2, -61), sample(1, 6, -62)]);

        let ap = cache.get(&Bssid([0x02, 0, 0, 0, 0, 1])).unwrap();
        let times: Vec<_> = ap.history().iter().map(|s| s.timestamp).collect();
        assert_eq!(times, vec![at(2), at(6), at(10)]);
        assert_eq!(ap.latest().unwrap().rssi_dbm, -60);
        assert_eq!(cache.newest_timestamp(), Some(at(10)));
    }

    #[test]
    fn insertion_order_is_stable() {
        let mut cache = AccessPointCache::default();
        cache.merge([sample(3, 0, -60), sample(1, 0, -60)]);
        cache.merge([sample(2, 1, -60), sample(1, 1, -60)]);

        let order: Vec<_> = cache.iter().map(|ap| ap.bssid().0[5]).collect();
        assert_eq!(order, vec![3, 1, 2]);
        assert_eq!(cache.access_points().len(), 3);
    }

    #[test]
    fn prune_is_strict_and_keeps_access_points() {
        let mut cache = AccessPointCache::default();
        cache.merge([sample(1, 0, -60), sample(1, 5, -60), sample(2, 1, -70)]);

        assert_eq!(cache.prune_older_than(at(5)), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&Bssid([0x02, 0, 0, 0, 0, 1])).unwrap().history().len(), 1);

        let emptied = cache.get(&Bssid([0x02, 0, 0, 0, 0, 2])).unwrap();
        assert!(emptied.history().is_empty());
        assert_eq!(emptied.ssid(), "");
        assert!(emptied.rssi_stats().is_none());
    }

    #[test]
    fn samples_since() {
        let mut cache = AccessPointCache::default();
        cache.merge((0..5).map(|t| sample(1, t, -60)));
        let bssid = Bssid([0x02, 0, 0, 0, 0, 1]);

        let recent = cache.samples_since(&bssid, at(3));
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].timestamp, at(3));

        assert!(cache.samples_since(&Bssid([9; 6]), at(0)).is_empty());
    }

    #[test]
    fn history_is_capped() {
        let mut cache = AccessPointCache::new(3);
        cache.merge((0..5).map(|t| sample(1, t, -60)));

        let ap = cache.get(&Bssid([0x02, 0, 0, 0, 0, 1])).unwrap();
        assert_eq!(ap.history().len(), 3);
        assert_eq!(ap.history().front().unwrap().timestamp, at(2));
    }

    #[test]
    fn colors_rotate_and_reset() {
        let mut cache = AccessPointCache::default();
        cache.merge((0..13).map(|n| sample(n, 0, -60)));

        let colors: Vec<_> = cache.iter().map(|ap| ap.color()).collect();
        assert_eq!(colors[0], AP_PALETTE[0]);
        assert_eq!(colors[11], AP_PALETTE[11]);
        assert_eq!(colors[12], AP_PALETTE[0]);

        cache.reset();
        assert!(cache.is_empty());
        assert_eq!(cache.newest_timestamp(), None);
        cache.merge([sample(40, 0, -60)]);
        assert_eq!(cache.iter().next().unwrap().color(), AP_PALETTE[0]);
    }

    #[test]
    fn connected_and_flags() {
        let mut cache = AccessPointCache::default();
        let mut linked = sample(2, 0, -45);
        linked.connected = true;
        cache.merge([sample(1, 0, -60), linked]);

        let bssid = Bssid([0x02, 0, 0, 0, 0, 2]);
        assert_eq!(cache.connected().unwrap().bssid(), bssid);

        assert!(cache.set_highlight(&bssid, true));
        assert!(cache.set_graph(&bssid, false));
        assert!(!cache.set_graph(&Bssid([9; 6]), false));
        let ap = cache.get(&bssid).unwrap();
        assert!(ap.highlight);
        assert!(!ap.graph);
    }

    #[test]
    fn rssi_statistics() {
        let mut cache = AccessPointCache::default();
        cache.merge([sample(1, 0, -60), sample(1, 1, -50), sample(1, 2, -70)]);

        let stats = cache.iter().next().unwrap().rssi_stats().unwrap();
        assert_eq!(
            stats,
            RssiStats {
                count: 3,
                min: -70,
                max: -50,
                mean: -60.0
            }
        );
        assert_eq!(cache.sample_count(), 3);
        assert_eq!(AP_PALETTE[1].to_hex(), "#24aae7");
    }

    #[test]
    fn shared_cache_snapshot() {
        let shared = AccessPointCache::default().shared();
        shared.write().merge([sample(1, 0, -60)]);

        let snapshot = shared.read().access_points();
        shared.write().merge([sample(1, 1, -60)]);

        assert_eq!(snapshot[0].history().len(), 1);
        assert_eq!(shared.read().sample_count(), 2);
    }
}
