//! Regions of interest: m/z traces followed across consecutive MS1 scans.

use crate::models::Scan;
use crate::utils::{
    TupleRange,
    binary_search_range_by_key,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RoiPoint {
    /// Index into the sample's MS1 scans.
    pub scan: usize,
    pub mz: f64,
    pub intensity: f32,
}

#[derive(Debug, Clone)]
pub(crate) struct Roi {
    pub points: Vec<RoiPoint>,
    weighted_mz_sum: f64,
    weight_sum: f64,
}

impl Roi {
    fn new(point: RoiPoint) -> Self {
        Self {
            weighted_mz_sum: point.mz * point.intensity as f64,
            weight_sum: point.intensity as f64,
            points: vec![point],
        }
    }

    fn push(&mut self, point: RoiPoint) {
        self.weighted_mz_sum += point.mz * point.intensity as f64;
        self.weight_sum += point.intensity as f64;
        self.points.push(point);
    }

    pub fn mean_mz(&self) -> f64 {
        if self.weight_sum > 0.0 {
            self.weighted_mz_sum / self.weight_sum
        } else {
            self.points[0].mz
        }
    }

    pub fn first_scan(&self) -> usize {
        self.points[0].scan
    }

    pub fn last_scan(&self) -> usize {
        self.points[self.points.len() - 1].scan
    }

    /// Range spanned by the m/z of the points.
    pub fn mz_range(&self) -> TupleRange<f64> {
        let (lo, hi) = self
            .points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.mz), hi.max(p.mz))
            });
        TupleRange::spanning(lo, hi)
    }
}

/// Merges two centroids that landed in the same ROI within one scan.
fn merge_points(a: RoiPoint, b: RoiPoint) -> RoiPoint {
    let weight = a.intensity as f64 + b.intensity as f64;
    let mz = if weight > 0.0 {
        (a.mz * a.intensity as f64 + b.mz * b.intensity as f64) / weight
    } else {
        a.mz
    };
    RoiPoint {
        scan: a.scan,
        mz,
        intensity: a.intensity + b.intensity,
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RoiParams {
    pub ppm: f64,
    pub noise: f32,
    pub max_missing_scans: usize,
    pub prefilter_scans: usize,
    pub prefilter_intensity: f32,
}

/// Links centroids of consecutive scans into ROIs.
///
/// A point joins the active ROI with the closest intensity-weighted mean
/// m/z within `ppm`; when two points of one scan land in the same ROI they
/// are merged. ROIs close after more than `max_missing_scans` scans
/// without a point. Returned ROIs pass the prefilter and are sorted by
/// (first scan, mean m/z).
pub(crate) fn build_rois(scans: &[Scan], params: &RoiParams) -> Vec<Roi> {
    let mut active: Vec<Roi> = Vec::new();
    let mut finished: Vec<Roi> = Vec::new();
    let mut pending: Vec<Option<RoiPoint>> = Vec::new();

    for (scan_idx, scan) in scans.iter().enumerate() {
        let (still_active, stale): (Vec<Roi>, Vec<Roi>) = active
            .into_iter()
            .partition(|r| r.last_scan() + params.max_missing_scans + 1 >= scan_idx);
        finished.extend(stale);
        active = still_active;

        pending.clear();
        pending.resize(active.len(), None);
        let mut new_rois: Vec<Roi> = Vec::new();

        for (&mz, &intensity) in scan.mz.iter().zip(scan.intensity.iter()) {
            if intensity <= 0.0 || intensity < params.noise {
                continue;
            }
            let point = RoiPoint {
                scan: scan_idx,
                mz,
                intensity,
            };
            let tol = mz * params.ppm / 1e6;
            let candidates =
                binary_search_range_by_key(&active, mz - tol, mz + tol, |r| r.mean_mz());
            let closest = candidates.min_by(|&a, &b| {
                let da = (active[a].mean_mz() - mz).abs();
                let db = (active[b].mean_mz() - mz).abs();
                da.total_cmp(&db)
            });

            match closest {
                Some(idx) => {
                    pending[idx] = Some(match pending[idx] {
                        Some(prev) => merge_points(prev, point),
                        None => point,
                    });
                }
                None => {
                    // Points within a scan are sorted, so only the last new
                    // ROI can be within tolerance.
                    match new_rois.last_mut() {
                        Some(last) if (last.mean_mz() - mz).abs() <= tol => {
                            *last = Roi::new(merge_points(last.points[0], point));
                        }
                        _ => new_rois.push(Roi::new(point)),
                    }
                }
            }
        }

        for (roi, point) in active.iter_mut().zip(pending.iter()) {
            if let Some(point) = point {
                roi.push(*point);
            }
        }
        active.extend(new_rois);
        active.sort_by(|a, b| a.mean_mz().total_cmp(&b.mean_mz()));
    }
    finished.extend(active);

    let min_points = params.prefilter_scans.max(2);
    let mut out: Vec<Roi> = finished
        .into_iter()
        .filter(|r| r.points.len() >= min_points)
        .filter(|r| {
            r.points
                .iter()
                .filter(|p| p.intensity >= params.prefilter_intensity)
                .count()
                >= params.prefilter_scans
        })
        .collect();
    out.sort_by(|a, b| {
        a.first_scan()
            .cmp(&b.first_scan())
            .then(a.mean_mz().total_cmp(&b.mean_mz()))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MsLevel;

    fn scan(rt: f32, points: &[(f64, f32)]) -> Scan {
        Scan {
            index: rt as usize,
            ms_level: MsLevel::MS1,
            rt_seconds: rt,
            mz: points.iter().map(|x| x.0).collect(),
            intensity: points.iter().map(|x| x.1).collect(),
            precursor: None,
        }
    }

    fn params() -> RoiParams {
        RoiParams {
            ppm: 10.0,
            noise: 0.0,
            max_missing_scans: 0,
            prefilter_scans: 3,
            prefilter_intensity: 10.0,
        }
    }

    #[test]
    fn test_links_points_within_ppm() {
        let scans: Vec<Scan> = (0..5)
            .map(|i| {
                scan(
                    i as f32,
                    &[(200.0 + (i as f64) * 0.0005, 100.0), (300.0, 50.0)],
                )
            })
            .collect();
        let rois = build_rois(&scans, &params());
        assert_eq!(rois.len(), 2);
        assert_eq!(rois[0].points.len(), 5);
        assert!((rois[0].mean_mz() - 200.001).abs() < 1e-3);
        assert!((rois[1].mean_mz() - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_gap_splits_roi_and_prefilter_drops_short() {
        let mut scans: Vec<Scan> = (0..4).map(|i| scan(i as f32, &[(200.0, 100.0)])).collect();
        scans.push(scan(4.0, &[]));
        scans.push(scan(5.0, &[]));
        scans.extend((6..8).map(|i| scan(i as f32, &[(200.0, 100.0)])));
        let rois = build_rois(&scans, &params());
        // Second stretch is only two scans long, below the prefilter.
        assert_eq!(rois.len(), 1);
        assert_eq!(rois[0].points.len(), 4);
    }

    #[test]
    fn test_missing_scans_are_tolerated() {
        let mut scans: Vec<Scan> = (0..3).map(|i| scan(i as f32, &[(200.0, 100.0)])).collect();
        scans.push(scan(3.0, &[]));
        scans.extend((4..6).map(|i| scan(i as f32, &[(200.0, 100.0)])));
        let p = RoiParams {
            max_missing_scans: 1,
            ..params()
        };
        let rois = build_rois(&scans, &p);
        assert_eq!(rois.len(), 1);
        assert_eq!(rois[0].first_scan(), 0);
        assert_eq!(rois[0].last_scan(), 5);
    }

    #[test]
    fn test_close_centroids_in_one_scan_merge() {
        let scans: Vec<Scan> = (0..3)
            .map(|i| scan(i as f32, &[(200.0, 100.0), (200.0005, 100.0)]))
            .collect();
        let rois = build_rois(&scans, &params());
        assert_eq!(rois.len(), 1);
        assert!(rois[0].points.iter().all(|p| p.intensity == 200.0));
    }
}
