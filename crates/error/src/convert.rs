use crate::{ErrorCode, FedstatError};

impl From<std::io::Error> for FedstatError {
    fn from(err: std::io::Error) -> Self {
        FedstatError::new(ErrorCode::Internal, err.to_string())
    }
}

impl From<serde_json::Error> for FedstatError {
    fn from(err: serde_json::Error) -> Self {
        FedstatError::new(ErrorCode::SerializationFailed, err.to_string())
    }
}

impl From<serde_yaml::Error> for FedstatError {
    fn from(err: serde_yaml::Error) -> Self {
        FedstatError::new(ErrorCode::InvalidConfig, err.to_string())
    }
}

/// Suggest the closest column name for UnknownColumn/MissingJoinKey hints.
pub fn find_closest_match<'a>(target: &str, options: &[&'a str]) -> Option<&'a str> {
    let mut best_match: Option<&str> = None;
    let mut min_distance = usize::MAX;

    for option in options {
        let distance = levenshtein(target, option);
        if distance < min_distance && distance <= 3 {
            min_distance = distance;
            best_match = Some(option);
        }
    }

    best_match
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (len_a, len_b) = (a.len(), b.len());

    let mut dp = vec![vec![0; len_b + 1]; len_a + 1];

    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=len_b {
        dp[0][j] = j;
    }

    for i in 1..=len_a {
        for j in 1..=len_b {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            dp[i][j] = std::cmp::min(
                std::cmp::min(dp[i - 1][j] + 1, dp[i][j - 1] + 1),
                dp[i - 1][j - 1] + cost,
            );
        }
    }

    dp[len_a][len_b]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_match_within_threshold() {
        let options = ["state", "population", "year"];
        assert_eq!(find_closest_match("stat", &options), Some("state"));
        assert_eq!(find_closest_match("yaer", &options), Some("year"));
        assert_eq!(find_closest_match("zzzzzzzz", &options), None);
    }

    #[test]
    fn test_io_error_maps_to_internal() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FedstatError = io.into();
        assert_eq!(err.code, ErrorCode::Internal);
    }
}
