use crate::shared::rect::BoundingBox;

/// IoU required for a detection to continue an existing track.
const MATCH_THRESHOLD: f64 = 0.3;

#[derive(Clone, Debug)]
struct TrackState {
    id: i64,
    bbox: BoundingBox,
    frames_lost: usize,
}

/// Greedy IoU face tracker.
///
/// Matches each frame's detections to live tracks best-overlap-first,
/// opens a new track per unmatched detection, and retires tracks that
/// go unmatched for more than `max_lost` consecutive frames. Ids are
/// monotonically assigned and never reused, so they are stable but not
/// contiguous.
pub struct FaceTracker {
    tracks: Vec<TrackState>,
    next_id: i64,
    max_lost: usize,
}

impl FaceTracker {
    pub fn new(max_lost: usize) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            max_lost,
        }
    }

    /// Returns one tracking id per detection, in input order.
    pub fn assign(&mut self, detections: &[BoundingBox]) -> Vec<i64> {
        let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            for (di, det) in detections.iter().enumerate() {
                let iou = track.bbox.iou(det);
                if iou >= MATCH_THRESHOLD {
                    pairs.push((iou, ti, di));
                }
            }
        }
        // Best overlap first; index order breaks ties deterministically.
        pairs.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
        });

        let mut track_taken = vec![false; self.tracks.len()];
        let mut ids: Vec<Option<i64>> = vec![None; detections.len()];
        for (_, ti, di) in pairs {
            if track_taken[ti] || ids[di].is_some() {
                continue;
            }
            track_taken[ti] = true;
            self.tracks[ti].bbox = detections[di];
            self.tracks[ti].frames_lost = 0;
            ids[di] = Some(self.tracks[ti].id);
        }

        for (ti, taken) in track_taken.iter().enumerate() {
            if !taken {
                self.tracks[ti].frames_lost += 1;
            }
        }
        let max_lost = self.max_lost;
        self.tracks.retain(|t| t.frames_lost <= max_lost);

        ids.iter()
            .enumerate()
            .map(|(di, id)| match id {
                Some(id) => *id,
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.tracks.push(TrackState {
                        id,
                        bbox: detections[di],
                        frames_lost: 0,
                    });
                    id
                }
            })
            .collect()
    }
}
