use std::time::Duration;

pub(crate) fn format_bytes(b: f64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    if !b.is_finite() || b <= 0.0 {
        return "0B".to_string();
    }
    if b >= GIB {
        return format!("{:.2}GiB", b / GIB);
    }
    if b >= MIB {
        return format!("{:.2}MiB", b / MIB);
    }
    if b >= KIB {
        return format!("{:.2}KiB", b / KIB);
    }

    format!("{b:.0}B")
}

pub(crate) fn format_rate(v: f64) -> String {
    if !v.is_finite() {
        return "0".to_string();
    }
    if v >= 100.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

pub(crate) fn format_ms(ms: f64) -> String {
    if !ms.is_finite() {
        return "-".to_string();
    }
    if ms >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else if ms >= 1.0 {
        format!("{ms:.1}ms")
    } else {
        format!("{:.0}us", ms * 1000.0)
    }
}

pub(crate) fn format_ms_opt(ms: Option<f64>) -> String {
    ms.map_or_else(|| "-".to_string(), format_ms)
}

/// `rate` is a fraction in 0..=1.
pub(crate) fn format_pct(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

pub(crate) fn format_signed_pct(pct: Option<f64>) -> String {
    match pct {
        Some(p) if p.is_finite() => format!("{p:+.1}%"),
        _ => "n/a".to_string(),
    }
}

pub(crate) fn format_duration(d: Duration) -> String {
    // Single rounded component in one of: us, ms, s.
    let total_ns: u128 = d.as_nanos();

    const NS_PER_US: u128 = 1_000;
    const NS_PER_MS: u128 = 1_000_000;
    const NS_PER_S: u128 = 1_000_000_000;

    fn round_div(value: u128, unit: u128) -> u128 {
        (value + (unit / 2)) / unit
    }

    if total_ns >= NS_PER_S {
        return format!("{}s", round_div(total_ns, NS_PER_S));
    }
    if total_ns >= NS_PER_MS {
        return format!("{}ms", round_div(total_ns, NS_PER_MS));
    }

    format!("{}us", round_div(total_ns, NS_PER_US))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_units() {
        assert_eq!(format_bytes(512.0), "512B");
        assert_eq!(format_bytes(2048.0), "2.00KiB");
        assert_eq!(format_rate(12.34), "12.3");
        assert_eq!(format_rate(1234.4), "1234");
        assert_eq!(format_ms(0.25), "250us");
        assert_eq!(format_ms(38.5), "38.5ms");
        assert_eq!(format_ms(1500.0), "1.50s");
        assert_eq!(format_pct(0.955), "95.5%");
        assert_eq!(format_signed_pct(Some(-3.04)), "-3.0%");
        assert_eq!(format_signed_pct(None), "n/a");
        assert_eq!(format_duration(Duration::from_millis(1499)), "1s");
        assert_eq!(format_duration(Duration::from_micros(1500)), "2ms");
    }
}
