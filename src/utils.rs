use indicatif::{ProgressState, ProgressStyle};

pub fn get_tqdm_style() -> anyhow::Result<ProgressStyle> {
    Ok(ProgressStyle::with_template(
        "{percent:>3}% |{wide_bar}| {pos}/{len} [{elapsed_precise}<{eta_precise}, {custom_per_sec}] {msg}",
    )?
    .with_key(
        "custom_per_sec",
        |s: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{:.2} it/s", s.per_sec());
        },
    )
    .progress_chars("██ "))
}

/// Parse an address given on the command line, with or without `0x`
pub fn parse_address(s: &str) -> Result<u64, std::num::ParseIntError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16)
}
