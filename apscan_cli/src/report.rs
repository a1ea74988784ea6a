use apscan_lib::channel::Band;
use apscan_lib::{AccessPointCache, CycleReport, NetworkSample};

pub fn print_cycle(cycle: &CycleReport) {
    println!(
        "cycle {} -- records: {}, merged: {}, new: {}, pruned: {}",
        cycle.cycle, cycle.records, cycle.merged, cycle.new_access_points, cycle.pruned
    );
}

pub fn print_sample(sample: &NetworkSample) {
    println!(
        "{} {} {:<32} ch {:>3} {:>4} dBm {}",
        sample.timestamp.format("%H:%M:%S%.3f"),
        sample.bssid,
        sample.ssid,
        sample.channel,
        sample.rssi_dbm,
        sample.security,
    );
}

/**
 * One row per access point, from its newest sample
 */
pub fn print_table(cache: &AccessPointCache) {
    println!(
        "  {:<17} {:<32} {:>3} {:<7} {:>5} {:>6} {:>6} {:<24} {:<16} {:>7}",
        "BSSID", "SSID", "CH", "BAND", "RSSI", "AVG", "MAX", "SECURITY", "TYPE", "COLOR"
    );
    for ap in cache.iter() {
        let Some(latest) = ap.latest() else {
            continue;
        };
        let marker = if latest.connected { '*' } else { ' ' };
        let max_rate = latest
            .max_rate()
            .map_or_else(|| "-".to_string(), |rate| format!("{rate}"));
        let mean_rssi = ap
            .rssi_stats()
            .map_or_else(|| "-".to_string(), |stats| format!("{:.1}", stats.mean));
        println!(
            "{} {:<17} {:<32} {:>3} {:<7} {:>5} {:>6} {:>6} {:<24} {:<16} {:>7}",
            marker,
            ap.bssid(),
            latest.ssid,
            latest.channel,
            Band::from_channel(latest.channel),
            latest.rssi_dbm,
            mean_rssi,
            max_rate,
            latest.security,
            latest.network_type,
            ap.color().to_hex(),
        );
    }
    println!(
        "{} access points, {} samples",
        cache.len(),
        cache.sample_count()
    );
}
