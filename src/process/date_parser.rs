use chrono::NaiveDate;
use once_cell::sync::Lazy;

/// Day zero of SAS date offsets.
pub static SAS_EPOCH: Lazy<NaiveDate> =
    Lazy::new(|| NaiveDate::from_ymd_opt(1960, 1, 1).expect("1960-01-01 is a valid date"));

/// Day zero of Arrow `Date32` values.
pub static UNIX_EPOCH: Lazy<NaiveDate> =
    Lazy::new(|| NaiveDate::from_ymd_opt(1970, 1, 1).expect("1970-01-01 is a valid date"));

/// 1960-01-01 plus `days`; `None` outside chrono's calendar range.
pub fn sas_offset_to_date(days: i64) -> Option<NaiveDate> {
    SAS_EPOCH.checked_add_signed(chrono::Duration::try_days(days)?)
}

/// Inverse of [`sas_offset_to_date`].
pub fn date_to_sas_offset(date: NaiveDate) -> i64 {
    date.signed_duration_since(*SAS_EPOCH).num_days()
}

/// SAS offset straight to an Arrow `Date32` day number.
pub fn sas_offset_to_date32(days: i64) -> Option<i32> {
    sas_offset_to_date(days).and_then(date_to_date32)
}

pub fn date_to_date32(date: NaiveDate) -> Option<i32> {
    i32::try_from(date.signed_duration_since(*UNIX_EPOCH).num_days()).ok()
}

pub fn date32_to_date(days: i32) -> Option<NaiveDate> {
    UNIX_EPOCH.checked_add_signed(chrono::Duration::try_days(days as i64)?)
}

/// Fast parse of `"MMddyyyy"`; anything that is not eight digits naming a
/// real calendar day is `None`.
pub fn parse_mmddyyyy(s: &str) -> Option<NaiveDate> {
    let b = s.trim().as_bytes();
    if b.len() != 8 || !b.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let num = |r: std::ops::Range<usize>| {
        b[r].iter()
            .fold(0u32, |acc, d| acc * 10 + (d - b'0') as u32)
    };
    let month = num(0..2);
    let day = num(2..4);
    let year = num(4..8) as i32;
    NaiveDate::from_ymd_opt(year, month, day)
}
