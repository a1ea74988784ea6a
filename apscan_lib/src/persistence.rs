/** ------------------------------------------------------------
 * Persistence (exporting the sample history to parquet files)
 * ------------------------------------------------------------- */
use crate::cache::AccessPointCache;
use std::fs::File;
use std::path::PathBuf;

use polars::prelude::*;
use polars::{datatypes::ListChunked, error::PolarsError, frame::DataFrame, series::Series};

/**
 * Parquet export of the retained samples, one row per sample
 */
impl AccessPointCache {
    pub fn to_dataframe(&self) -> Result<DataFrame, PolarsError> {
        let rows = self.sample_count();
        let mut timestamps = Vec::with_capacity(rows);
        let mut bssids = Vec::with_capacity(rows);
        let mut ssids = Vec::with_capacity(rows);
        let mut channels = Vec::with_capacity(rows);
        let mut rssi = Vec::with_capacity(rows);
        let mut high_throughput = Vec::with_capacity(rows);
        let mut security = Vec::with_capacity(rows);
        let mut network_types = Vec::with_capacity(rows);
        let mut connected = Vec::with_capacity(rows);
        let mut colors = Vec::with_capacity(rows);
        let mut rates = Vec::with_capacity(rows);

        for ap in self.iter() {
            let color = ap.color().to_hex();
            for sample in ap.history() {
                // Seconds since the epoch, microsecond resolution
                timestamps.push(sample.timestamp.timestamp_micros() as f64 * 1e-6);
                bssids.push(sample.bssid.to_string());
                ssids.push(sample.ssid.clone());
                channels.push(sample.channel);
                rssi.push(sample.rssi_dbm);
                high_throughput.push(sample.is_high_throughput);
                security.push(sample.security.clone());
                network_types.push(sample.network_type.as_str());
                connected.push(sample.connected);
                colors.push(color.clone());
                rates.push(sample.rates.clone());
            }
        }

        // Convert Vec<Vec<f64>> to a List Series of f64
        let rates_series = ListChunked::from_iter(
            rates
                .into_iter()
                .map(|inner| Float64Chunked::from_vec("rates_inner", inner).into_series()),
        )
        .into_series()
        .with_name("rates");

        DataFrame::new(vec![
            Series::new("timestamps", &timestamps),
            Series::new("bssid", &bssids),
            Series::new("ssid", &ssids),
            Series::new("channel", &channels),
            Series::new("rssi_dbm", &rssi),
            rates_series,
            Series::new("high_throughput", &high_throughput),
            Series::new("security", &security),
            Series::new("network_type", &network_types),
            Series::new("connected", &connected),
            Series::new("color", &colors),
        ])
    }

    pub fn to_parquet(&self, file_path: PathBuf) -> Result<(), PolarsError> {
        let mut df = self.to_dataframe()?;

        // Write DataFrame to a Parquet file
        let file = File::create(file_path)?;
        ParquetWriter::new(file).finish(&mut df)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::tests::sample;
    use crate::cache::AccessPointCache;
    use polars::prelude::*;
    use std::fs::File;

    #[test]
    fn one_row_per_sample() {
        let mut cache = AccessPointCache::default();
        cache.merge([sample(1, 0, -60), sample(2, 0, -70), sample(1, 1, -61)]);

        let df = cache.to_dataframe().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 11);

        // Grouped by access point in first-sighting order
        let rssi: Vec<Option<i32>> = df.column("rssi_dbm").unwrap().i32().unwrap().into_iter().collect();
        assert_eq!(rssi, vec![Some(-60), Some(-61), Some(-70)]);
    }

    #[test]
    fn parquet_round_trip() {
        let mut cache = AccessPointCache::default();
        cache.merge([sample(1, 0, -60), sample(1, 1, -55)]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.parquet");
        cache.to_parquet(path.clone()).unwrap();

        let df = ParquetReader::new(File::open(path).unwrap()).finish().unwrap();
        assert_eq!(df.height(), 2);
        let bssid = df.column("bssid").unwrap().str().unwrap().get(0);
        assert_eq!(bssid, Some("02:00:00:00:00:01"));
    }

    #[test]
    fn empty_cache_exports_empty_frame() {
        let df = AccessPointCache::default().to_dataframe().unwrap();
        assert_eq!(df.height(), 0);
    }
}
