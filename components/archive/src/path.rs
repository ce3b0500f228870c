use chrono::{DateTime, Datelike, Timelike, Utc};
use std::path::{Path, PathBuf};
use vmu_product::time::adjust_generation_time;
use vmu_product::Product;

/// Instance subdirectory. Unknown instances archive under DATA.
pub fn instance_dir(instance: u8) -> String {
    match instance {
        0 => "TEST".to_string(),
        1 | 2 => format!("SIM{instance}"),
        255 => "OPS".to_string(),
        _ => "DATA".to_string(),
    }
}

/// Canonical archive directory for a product:
/// `<instance>/<kind>/<mode>/<origin>/<YYYY>/<DDD>/<HH>[/<MM>]`.
///
/// `alt` selects the common-header acquisition time instead of the
/// sub-header generation time as the bucketing source; the minute level only
/// appears for granularity > 0, truncated to the bucket start.
pub fn product_dir(base: &Path, product: &Product, instance: u8, granularity: u32, alt: bool) -> PathBuf {
    let mut dir = base.join(instance_dir(instance));
    dir.push(match product {
        Product::Image(_) => "images",
        Product::Table(_) => "sciences",
    });
    dir.push(if product.is_realtime() { "realtime" } else { "playback" });
    dir.push(product.origin());
    let t = if alt { product.generated() } else { product.timestamp() };
    push_time(&mut dir, t, granularity);
    dir
}

/// HRDP capture directory: instance and time levels only.
pub fn hrdp_dir(base: &Path, t: DateTime<Utc>, instance: u8) -> PathBuf {
    let mut dir = base.join(instance_dir(instance));
    push_time(&mut dir, t, 0);
    dir
}

fn push_time(dir: &mut PathBuf, t: DateTime<Utc>, granularity: u32) {
    let t = adjust_generation_time(t.timestamp());
    dir.push(format!("{:04}", t.year()));
    dir.push(format!("{:03}", t.ordinal()));
    dir.push(format!("{:02}", t.hour()));
    if granularity > 0 {
        dir.push(format!("{:02}", t.minute() / granularity * granularity));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vmu_product::fixtures::{self, TableParams};

    #[test]
    fn instance_mapping() {
        assert_eq!(instance_dir(0), "TEST");
        assert_eq!(instance_dir(1), "SIM1");
        assert_eq!(instance_dir(2), "SIM2");
        assert_eq!(instance_dir(255), "OPS");
        assert_eq!(instance_dir(77), "DATA");
    }

    #[test]
    fn paths_are_deterministic_and_time_bucketed() {
        let table = fixtures::table_v2(TableParams::default());
        let product = Product::Table(table);
        let a = product_dir(Path::new("/archive"), &product, 255, 0, false);
        let b = product_dir(Path::new("/archive"), &product, 255, 0, false);
        assert_eq!(a, b);

        let t = adjust_generation_time(product.timestamp().timestamp());
        let want = format!(
            "/archive/OPS/sciences/realtime/51/{:04}/{:03}/{:02}",
            t.year(),
            t.ordinal(),
            t.hour()
        );
        assert_eq!(a, PathBuf::from(want));
    }

    #[test]
    fn granularity_appends_minute_bucket() {
        let table = fixtures::table_v2(TableParams {
            acquisition: Utc.with_ymd_and_hms(2018, 7, 14, 10, 17, 30).unwrap(),
            ..TableParams::default()
        });
        let product = Product::Table(table);
        let dir = product_dir(Path::new("/archive"), &product, 0, 5, false);
        let t = adjust_generation_time(product.timestamp().timestamp());
        let bucket = t.minute() / 5 * 5;
        assert!(dir.ends_with(format!("{:02}", bucket)), "{dir:?}");
    }

    #[test]
    fn alt_selects_the_common_header_time() {
        // sub-header generation an hour apart from the VMU acquisition
        let mut table = fixtures::table_v2(TableParams::default());
        table.vmu.coarse += 3600;
        let product = Product::Table(fixtures::seal_table(table));
        let primary = product_dir(Path::new("/a"), &product, 0, 0, false);
        let alt = product_dir(Path::new("/a"), &product, 0, 0, true);
        assert_ne!(primary, alt);
    }

    #[test]
    fn playback_products_archive_apart() {
        let table = fixtures::table_v2(TableParams { source: 0x01, ..TableParams::default() });
        let product = Product::Table(table);
        let dir = product_dir(Path::new("/archive"), &product, 1, 0, false);
        assert!(dir.starts_with("/archive/SIM1/sciences/playback/51"), "{dir:?}");
    }
}
