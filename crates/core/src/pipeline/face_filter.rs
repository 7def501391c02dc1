use crate::engine::domain::face_engine::DetectedFace;

/// Reduces the detection list to its largest face by area.
///
/// Ties keep the earliest detection. Used when liveness can only judge a
/// single subject per frame.
pub fn keep_largest_face(faces: Vec<DetectedFace>) -> Vec<DetectedFace> {
    if faces.len() <= 1 {
        return faces;
    }
    let mut largest: Option<DetectedFace> = None;
    for face in faces {
        if largest
            .as_ref()
            .map_or(true, |best| face.rect.area() > best.rect.area())
        {
            largest = Some(face);
        }
    }
    largest.into_iter().collect()
}
