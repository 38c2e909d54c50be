use crate::error::PulseError;
use crate::signal::{HrvSummary, PpiSeries};

/// Truncated mean of the accumulated instantaneous heart rates.
pub fn mean_hr(hr: &[f64]) -> Result<u32, PulseError> {
    if hr.is_empty() {
        return Err(PulseError::EmptyHrSeries);
    }
    Ok((hr.iter().sum::<f64>() / hr.len() as f64) as u32)
}

/// Truncated mean of the peak-to-peak intervals in milliseconds.
pub fn mean_ppi(ppi: &PpiSeries) -> Result<u32, PulseError> {
    if ppi.is_empty() {
        return Err(PulseError::EmptyPpiSeries);
    }
    let sum: u64 = ppi.ms.iter().map(|&v| v as u64).sum();
    Ok((sum / ppi.len() as u64) as u32)
}

/// Root mean square of successive interval differences, truncated.
///
/// Needs at least two intervals; with fewer the successive-difference list
/// is empty and the mean is undefined.
pub fn rmssd(ppi: &PpiSeries) -> Result<u32, PulseError> {
    if ppi.len() < 2 {
        return Err(PulseError::ShortPpiSeries {
            need: 2,
            have: ppi.len(),
        });
    }
    let sum_sq: f64 = ppi
        .ms
        .windows(2)
        .map(|w| {
            let diff = w[1] as f64 - w[0] as f64;
            diff * diff
        })
        .sum();
    let mean_sq = sum_sq / (ppi.len() - 1) as f64;
    Ok(mean_sq.sqrt() as u32)
}

/// Population standard deviation of the intervals around the truncated mean,
/// truncated.
pub fn sdnn(ppi: &PpiSeries) -> Result<u32, PulseError> {
    let mean = mean_ppi(ppi)? as f64;
    let sum_sq: f64 = ppi
        .ms
        .iter()
        .map(|&v| {
            let diff = mean - v as f64;
            diff * diff
        })
        .sum();
    let mean_sq = sum_sq / ppi.len() as f64;
    Ok(mean_sq.sqrt() as u32)
}

/// Full session summary. Pure over its inputs: calling it twice on the same
/// series yields identical results.
pub fn summarize(hr: &[f64], ppi: &PpiSeries) -> Result<HrvSummary, PulseError> {
    Ok(HrvSummary {
        mean_hr: mean_hr(hr)?,
        mean_ppi: mean_ppi(ppi)?,
        rmssd: rmssd(ppi)?,
        sdnn: sdnn(ppi)?,
    })
}

/// Summary from an interval list alone, with the heart rate series derived
/// from the intervals (60000 ms / interval). Used by the offline tools where
/// no live HR accumulation happened.
pub fn summarize_from_ppi(ppi: &PpiSeries) -> Result<HrvSummary, PulseError> {
    let hr: Vec<f64> = ppi
        .ms
        .iter()
        .filter(|&&v| v > 0)
        .map(|&v| 60_000.0 / v as f64)
        .collect();
    summarize(&hr, ppi)
}
