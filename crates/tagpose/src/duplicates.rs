use log::warn;

use crate::detection::{RawDetection, TagId};

/// Drop every detection whose id occurs more than once in the frame.
///
/// All copies go, not all but one: with two instances of an id there is no
/// telling which is genuine. The survivors come back sorted by id (ties keep
/// input order); the removed ids are returned in ascending order, each once.
pub fn remove_duplicates(mut detections: Vec<RawDetection>) -> (Vec<RawDetection>, Vec<TagId>) {
    detections.sort_by_key(|d| d.id);

    let mut kept = Vec::with_capacity(detections.len());
    let mut removed = Vec::new();
    let mut iter = detections.into_iter().peekable();
    while let Some(det) = iter.next() {
        let id = det.id;
        let mut run = 1usize;
        while iter.next_if(|next| next.id == id).is_some() {
            run += 1;
        }
        if run == 1 {
            kept.push(det);
        } else {
            warn!("removing tag ID {id} from detections because it appears {run} times");
            removed.push(id);
        }
    }
    (kept, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn det(id: TagId, shift: f64) -> RawDetection {
        let corners = [
            Point2::new(shift, 10.0 + shift),
            Point2::new(10.0 + shift, 10.0 + shift),
            Point2::new(10.0 + shift, shift),
            Point2::new(shift, shift),
        ];
        RawDetection::from_corners(id, corners).expect("detection")
    }

    fn ids(dets: &[RawDetection]) -> Vec<TagId> {
        dets.iter().map(|d| d.id).collect()
    }

    #[test]
    fn distinct_ids_are_kept_sorted() {
        let (kept, removed) = remove_duplicates(vec![det(3, 0.0), det(1, 1.0), det(2, 2.0)]);
        assert_eq!(ids(&kept), vec![1, 2, 3]);
        assert!(removed.is_empty());
    }

    #[test]
    fn every_copy_of_a_repeated_id_is_dropped() {
        let input = vec![det(9, 0.0), det(4, 1.0), det(9, 2.0), det(7, 3.0), det(9, 4.0)];
        let (kept, removed) = remove_duplicates(input);
        assert_eq!(ids(&kept), vec![4, 7]);
        assert_eq!(removed, vec![9]);
    }

    #[test]
    fn trailing_duplicate_run_is_removed() {
        let (kept, removed) = remove_duplicates(vec![det(1, 0.0), det(5, 1.0), det(5, 2.0)]);
        assert_eq!(ids(&kept), vec![1]);
        assert_eq!(removed, vec![5]);
    }

    #[test]
    fn extreme_ids_do_not_collide_with_a_sentinel() {
        let input = vec![det(TagId::MAX, 0.0), det(TagId::MIN, 1.0), det(-1, 2.0)];
        let (kept, removed) = remove_duplicates(input);
        assert_eq!(ids(&kept), vec![TagId::MIN, -1, TagId::MAX]);
        assert!(removed.is_empty());
    }

    #[test]
    fn removal_is_idempotent() {
        let input = vec![det(2, 0.0), det(2, 1.0), det(8, 2.0), det(3, 3.0), det(3, 4.0)];
        let (once, _) = remove_duplicates(input);
        let (twice, removed_again) = remove_duplicates(once.clone());
        assert_eq!(once, twice);
        assert!(removed_again.is_empty());
    }

    #[test]
    fn empty_input() {
        let (kept, removed) = remove_duplicates(Vec::new());
        assert!(kept.is_empty() && removed.is_empty());
    }
}
