use crate::shared::geometry::Point;

/// The five fingertip joints a hand pose model reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fingertip {
    Thumb,
    Index,
    Middle,
    Ring,
    Little,
}

impl Fingertip {
    pub const ALL: [Fingertip; 5] = [
        Fingertip::Thumb,
        Fingertip::Index,
        Fingertip::Middle,
        Fingertip::Ring,
        Fingertip::Little,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FingertipPoint {
    pub finger: Fingertip,
    pub location: Point,
    pub confidence: f32,
}

/// Fingertips of one detected hand, in thumb-to-little order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HandObservation {
    pub fingertips: Vec<FingertipPoint>,
}

impl HandObservation {
    pub fn new(fingertips: Vec<FingertipPoint>) -> Self {
        Self { fingertips }
    }

    /// Locations of fingertips whose confidence is strictly above `threshold`.
    pub fn confident_tips(&self, threshold: f32) -> Vec<Point> {
        self.fingertips
            .iter()
            .filter(|tip| tip.confidence > threshold)
            .map(|tip| tip.location)
            .collect()
    }
}

/// Reduces raw hand observations to fingertip sets.
///
/// Keeps at most `max_hands` hands, drops low-confidence tips, and drops
/// hands left with no tips at all.
pub fn fingertip_sets(hands: &[HandObservation], threshold: f32, max_hands: usize) -> Vec<Vec<Point>> {
    hands
        .iter()
        .take(max_hands)
        .map(|hand| hand.confident_tips(threshold))
        .filter(|tips| !tips.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tip(finger: Fingertip, x: f64, confidence: f32) -> FingertipPoint {
        FingertipPoint {
            finger,
            location: Point::new(x, 0.5),
            confidence,
        }
    }

    fn full_hand(confidence: f32) -> HandObservation {
        HandObservation::new(
            Fingertip::ALL
                .iter()
                .enumerate()
                .map(|(i, f)| tip(*f, 0.1 * i as f64, confidence))
                .collect(),
        )
    }

    #[rstest]
    #[case::below(0.2, 0)]
    #[case::exactly_threshold(0.3, 0)]
    #[case::just_above(0.31, 5)]
    #[case::certain(1.0, 5)]
    fn test_confident_tips_strictly_above_threshold(#[case] confidence: f32, #[case] kept: usize) {
        assert_eq!(full_hand(confidence).confident_tips(0.3).len(), kept);
    }

    #[test]
    fn test_confident_tips_preserve_order() {
        let hand = HandObservation::new(vec![
            tip(Fingertip::Thumb, 0.1, 0.9),
            tip(Fingertip::Index, 0.2, 0.1),
            tip(Fingertip::Middle, 0.3, 0.8),
        ]);
        let tips = hand.confident_tips(0.3);
        assert_eq!(tips, vec![Point::new(0.1, 0.5), Point::new(0.3, 0.5)]);
    }

    #[test]
    fn test_fingertip_sets_drop_empty_hands() {
        let hands = vec![full_hand(0.1), full_hand(0.9)];
        let sets = fingertip_sets(&hands, 0.3, 2);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].len(), 5);
    }

    #[test]
    fn test_fingertip_sets_respect_max_hands() {
        let hands = vec![full_hand(0.9), full_hand(0.9), full_hand(0.9)];
        assert_eq!(fingertip_sets(&hands, 0.3, 1).len(), 1);
    }

    #[test]
    fn test_fingertip_sets_empty_input() {
        assert!(fingertip_sets(&[], 0.3, 1).is_empty());
    }
}
