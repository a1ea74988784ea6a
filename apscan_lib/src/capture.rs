/** ------------------------------------------------------------
 * pcap-backed scan provider.
 *
 * Builds BSS records from beacon and probe-response frames, either
 * replayed from a capture file or sniffed live on a monitor-mode
 * interface.
 * ------------------------------------------------------------- */
use crate::channel::channel_to_frequency;
use crate::errors::ScanError;
use crate::ie::decode_ies;
use crate::normalize::normalize;
use crate::provider::{AdapterHandle, NetworkSnapshot, ProviderEvent, ProviderEvents, ScanProvider};
use crate::radiotap::parse_radiotap;
use crate::record::{Bssid, NetworkSample, RawBssRecord, SignalReading};
use crate::security::classify;
use crate::util::ByteCursor;
use chrono::{DateTime, Utc};
use pcap::{Active, Capture, Device, Linktype, Offline, Packet, PacketHeader};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;

/// Beacon and probe-response management frames
const BEACON_FILTER: &str = "type mgt subtype beacon or type mgt subtype probe-resp";

const FRAME_SUBTYPE_MASK: u8 = 0xfc;
const FRAME_BEACON: u8 = 0x80;
const FRAME_PROBE_RESPONSE: u8 = 0x50;

const MGMT_HEADER_LEN: usize = 24;
const FCS_LEN: usize = 4;

const CAPABILITY_ESS: u16 = 1 << 0;
const CAPABILITY_IBSS: u16 = 1 << 1;
const CAPABILITY_PRIVACY: u16 = 1 << 4;

// Upper bound on frames taken from a live capture per scan
const MAX_LIVE_DRAIN: usize = 10_000;

/**
 * Fixed part of a beacon / probe response plus its IE blob
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconFrame<'a> {
    pub bssid: [u8; 6],
    pub timestamp: u64,
    pub beacon_interval: u16,
    pub capability: u16,
    pub ies: &'a [u8],
}

/**
 * Parse an 802.11 beacon or probe-response frame (FCS already removed)
 */
pub fn parse_management_frame(frame: &[u8]) -> Option<BeaconFrame<'_>> {
    let mut cursor = ByteCursor::new(frame);
    let frame_control = cursor.read_u8()?;
    if !matches!(
        frame_control & FRAME_SUBTYPE_MASK,
        FRAME_BEACON | FRAME_PROBE_RESPONSE
    ) {
        return None;
    }

    // flags, duration, addr1, addr2
    cursor.skip(1 + 2 + 6 + 6)?;
    let bssid = cursor.read_array::<6>()?;
    cursor.skip(2)?; // sequence control
    debug_assert_eq!(cursor.position(), MGMT_HEADER_LEN);

    let timestamp = u64::from_le_bytes(cursor.read_array::<8>()?);
    let beacon_interval = cursor.read_u16_le()?;
    let capability = cursor.read_u16_le()?;

    Some(BeaconFrame {
        bssid,
        timestamp,
        beacon_interval,
        capability,
        ies: cursor.rest(),
    })
}

/**
 * Build a raw BSS record from a captured packet of the given link type
 *
 * Radiotap supplies the channel frequency and the dBm signal; the DS
 * parameter set element is the channel fallback.
 */
pub fn record_from_frame(linktype: Linktype, data: &[u8]) -> Option<RawBssRecord> {
    let (radiotap, frame) = if linktype == Linktype::IEEE802_11_RADIOTAP {
        let radiotap = parse_radiotap(data)?;
        let frame = data.get(radiotap.header_len..)?;
        (Some(radiotap), frame)
    } else if linktype == Linktype::IEEE802_11 {
        (None, data)
    } else {
        return None;
    };

    let frame = match &radiotap {
        Some(info) if info.has_fcs() => &frame[..frame.len().saturating_sub(FCS_LEN)],
        _ => frame,
    };
    let beacon = parse_management_frame(frame)?;
    let decoded = decode_ies(beacon.ies, beacon.ies.len());

    let frequency_khz = radiotap
        .as_ref()
        .and_then(|info| info.channel_freq_khz())
        .or_else(|| decoded.ds_channel.map(|ch| channel_to_frequency(ch as u32)))
        .unwrap_or(0);
    let signal = match radiotap.as_ref().and_then(|info| info.antenna_signal_dbm) {
        Some(dbm) => SignalReading::Rssi(dbm as i32),
        None => SignalReading::LinkQuality(0),
    };
    let infrastructure_mode = if beacon.capability & CAPABILITY_ESS != 0 {
        1
    } else if beacon.capability & CAPABILITY_IBSS != 0 {
        0
    } else {
        2
    };
    let privacy = beacon.capability & CAPABILITY_PRIVACY != 0;
    let (authentication, cipher) = classify(privacy, decoded.rsn.as_ref(), decoded.wpa.as_ref());

    let ssid = decoded.ssid.unwrap_or_default();
    Some(RawBssRecord {
        bssid: beacon.bssid,
        ssid_len: ssid.len() as u32,
        ssid,
        frequency_khz,
        signal,
        supported_rates: decoded.supported_rates,
        ies: beacon.ies.to_vec(),
        ie_len: beacon.ies.len() as u32,
        infrastructure_mode,
        authentication: authentication.as_str().to_string(),
        cipher: cipher.as_str().to_string(),
    })
}

/// Capture time of a packet.
fn packet_time(header: &PacketHeader) -> DateTime<Utc> {
    let secs = header.ts.tv_sec as i64;
    let nanos = (header.ts.tv_usec as u32).saturating_mul(1000);
    DateTime::from_timestamp(secs, nanos).unwrap_or_default()
}

/**
 * A BSS record with the time it was captured
 */
#[derive(Debug, Clone)]
struct Observation {
    record: RawBssRecord,
    captured_at: DateTime<Utc>,
}

fn observe(linktype: Linktype, packet: &Packet) -> Option<Observation> {
    let record = record_from_frame(linktype, packet.data)?;
    Some(Observation {
        record,
        captured_at: packet_time(packet.header),
    })
}

/**
 * Latest record per BSSID in first-seen order, like a driver BSS list
 */
#[derive(Debug, Default)]
struct BssBatch {
    records: Vec<RawBssRecord>,
    index: HashMap<[u8; 6], usize>,
    captured_at: Option<DateTime<Utc>>,
}

impl BssBatch {
    fn insert(&mut self, observation: Observation) {
        let Observation {
            record,
            captured_at,
        } = observation;
        match self.index.get(&record.bssid) {
            Some(&slot) => self.records[slot] = record,
            None => {
                self.index.insert(record.bssid, self.records.len());
                self.records.push(record);
            }
        }
        self.captured_at = self.captured_at.max(Some(captured_at));
    }
}

struct OfflineSource {
    capture: Capture<Offline>,
    linktype: Linktype,
    replay_window: chrono::Duration,
    pending: Option<Observation>,
    exhausted: bool,
}

impl OfflineSource {
    fn next_observation(&mut self) -> Result<Option<Observation>, ScanError> {
        loop {
            match self.capture.next_packet() {
                Ok(packet) => {
                    if let Some(observation) = observe(self.linktype, &packet) {
                        return Ok(Some(observation));
                    }
                }
                Err(pcap::Error::NoMorePackets) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /**
     * Consume one replay window of capture time, starting at the first
     * frame not yet consumed.
     */
    fn next_window(&mut self) -> Result<BssBatch, ScanError> {
        let mut batch = BssBatch::default();
        let first = match self.pending.take() {
            Some(observation) => Some(observation),
            None => self.next_observation()?,
        };
        let Some(first) = first else {
            self.exhausted = true;
            return Ok(batch);
        };

        // None: the window reaches past the last representable instant
        let window_end = first.captured_at.checked_add_signed(self.replay_window);
        batch.insert(first);
        loop {
            match self.next_observation()? {
                Some(observation)
                    if window_end.map_or(true, |end| observation.captured_at < end) =>
                {
                    batch.insert(observation)
                }
                Some(observation) => {
                    self.pending = Some(observation);
                    break;
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }
        Ok(batch)
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted && self.pending.is_none()
    }
}

struct LiveSource {
    capture: Capture<Active>,
    linktype: Linktype,
}

impl LiveSource {
    /// Everything buffered since the last drain.
    fn drain(&mut self) -> Result<BssBatch, ScanError> {
        let mut batch = BssBatch::default();
        for _ in 0..MAX_LIVE_DRAIN {
            match self.capture.next_packet() {
                Ok(packet) => {
                    if let Some(observation) = observe(self.linktype, &packet) {
                        batch.insert(observation);
                    }
                }
                Err(pcap::Error::TimeoutExpired) | Err(pcap::Error::NoMorePackets) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(batch)
    }
}

enum CaptureSource {
    Offline(OfflineSource),
    Live(LiveSource),
}

/**
 * How a capture provider gets its frames
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Adapter name is a capture file path. Each scan consumes
    /// `replay_window` of capture time.
    Offline { replay_window: Duration },
    /// Adapter name is a monitor-mode capable interface.
    Live,
}

/**
 * Scan provider over a pcap capture
 */
pub struct CaptureScanProvider {
    mode: CaptureMode,
    source: Option<CaptureSource>,
    adapter: Option<AdapterHandle>,
    connected: Option<Bssid>,
    events: ProviderEvents,
}

impl CaptureScanProvider {
    pub fn new(mode: CaptureMode, settle_delay: Duration) -> Self {
        Self {
            mode,
            source: None,
            adapter: None,
            connected: None,
            events: ProviderEvents::new(settle_delay),
        }
    }

    pub fn offline(replay_window: Duration, settle_delay: Duration) -> Self {
        Self::new(CaptureMode::Offline { replay_window }, settle_delay)
    }

    pub fn live(settle_delay: Duration) -> Self {
        Self::new(CaptureMode::Live, settle_delay)
    }

    /// A capture has no association; the caller may name one.
    pub fn with_connected(mut self, bssid: Option<Bssid>) -> Self {
        self.connected = bssid;
        self
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// True once an offline capture has been fully replayed.
    pub fn is_exhausted(&self) -> bool {
        match &self.source {
            Some(CaptureSource::Offline(source)) => source.is_exhausted(),
            _ => false,
        }
    }

    fn open(&self, adapter: &AdapterHandle) -> Result<CaptureSource, ScanError> {
        match self.mode {
            CaptureMode::Offline { replay_window } => {
                let capture = Capture::from_file(&adapter.name)
                    .map_err(|e| ScanError::InvalidAdapter(format!("{}: {e}", adapter.name)))?;
                let linktype = check_linktype(capture.get_datalink(), adapter)?;
                let replay_window = chrono::Duration::from_std(replay_window)
                    .map_err(|e| ScanError::Capture(e.to_string()))?;
                Ok(CaptureSource::Offline(OfflineSource {
                    capture,
                    linktype,
                    replay_window,
                    pending: None,
                    exhausted: false,
                }))
            }
            CaptureMode::Live => {
                let device = Device::list()?
                    .into_iter()
                    .find(|d| d.name == adapter.name)
                    .ok_or_else(|| ScanError::InvalidAdapter(adapter.name.clone()))?;
                let mut capture = Capture::from_device(device)?
                    .rfmon(true)
                    .immediate_mode(true)
                    .snaplen(65535)
                    .open()?;
                let linktype = check_linktype(capture.get_datalink(), adapter)?;
                capture.filter(BEACON_FILTER, true)?;
                let capture = capture.setnonblock()?;
                Ok(CaptureSource::Live(LiveSource { capture, linktype }))
            }
        }
    }
}

fn check_linktype(linktype: Linktype, adapter: &AdapterHandle) -> Result<Linktype, ScanError> {
    if linktype == Linktype::IEEE802_11_RADIOTAP || linktype == Linktype::IEEE802_11 {
        Ok(linktype)
    } else {
        Err(ScanError::InvalidAdapter(format!(
            "{}: unsupported link type {}",
            adapter.name, linktype.0
        )))
    }
}

impl ScanProvider for CaptureScanProvider {
    fn init(&mut self, adapter: Option<AdapterHandle>) -> Result<(), ScanError> {
        let adapter = adapter.ok_or_else(|| ScanError::InvalidAdapter("no adapter".into()))?;
        if !adapter.is_valid() {
            return Err(ScanError::InvalidAdapter(adapter.name));
        }

        self.source = Some(self.open(&adapter)?);
        tracing::info!(adapter = %adapter, mode = ?self.mode, "capture provider bound");
        self.adapter = Some(adapter);
        Ok(())
    }

    fn scan(&mut self) -> bool {
        match &self.source {
            None => {
                self.events.interface_error(ScanError::NotInitialized);
                false
            }
            Some(CaptureSource::Offline(source)) if source.is_exhausted() => {
                self.events
                    .interface_error(ScanError::Capture("end of capture".into()));
                false
            }
            Some(_) => {
                self.events.arm_settle_timer();
                true
            }
        }
    }

    fn network_data(&mut self) -> Result<NetworkSnapshot, ScanError> {
        let batch = match self.source.as_mut() {
            None => return Err(ScanError::NotInitialized),
            Some(CaptureSource::Offline(source)) => source.next_window()?,
            Some(CaptureSource::Live(source)) => source.drain()?,
        };

        tracing::debug!(records = batch.records.len(), "capture window read");
        Ok(NetworkSnapshot {
            records: batch.records,
            connected: self.connected,
            captured_at: batch.captured_at,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn adapter(&self) -> Option<&AdapterHandle> {
        self.adapter.as_ref()
    }
}

/**
 * Decode every beacon / probe response of a capture file into a sample,
 * stamped with its capture time
 *
 * \param capture_path Path to pcap capture file
 * \param connected BSSID to flag as connected
 */
pub fn decode_capture(
    capture_path: &Path,
    connected: Option<Bssid>,
) -> Result<Vec<NetworkSample>, ScanError> {
    let mut capture = Capture::from_file(capture_path)?;
    let linktype = capture.get_datalink();

    let mut samples = Vec::new();
    loop {
        match capture.next_packet() {
            Ok(packet) => {
                let Some(observation) = observe(linktype, &packet) else {
                    continue;
                };
                if let Some(sample) =
                    normalize(&observation.record, connected, observation.captured_at)
                {
                    samples.push(sample);
                }
            }
            Err(pcap::Error::NoMorePackets) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(samples)
}
