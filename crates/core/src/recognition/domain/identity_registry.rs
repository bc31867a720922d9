use serde::Deserialize;

use crate::recognition::domain::recognition_client::RecognitionError;

/// One enrolled identity as reported by the backend.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct EnrolledUser {
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(default)]
    pub total_images: u64,
    #[serde(default)]
    pub embedding_count: u64,
    #[serde(default)]
    pub total_training_sessions: u64,
    #[serde(default)]
    pub first_training: Option<String>,
    #[serde(default)]
    pub last_training: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub total_pages: u32,
    pub offset: u64,
    pub returned_count: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

/// One page of the enrolled-identity listing.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct UserReport {
    pub users: Vec<EnrolledUser>,
    pub pagination: Pagination,
    pub total_users: u64,
    pub total_embeddings: u64,
}

impl UserReport {
    /// Whether `page` can be navigated to from this report.
    pub fn page_in_range(&self, page: u32) -> bool {
        page >= 1 && page <= self.pagination.total_pages
    }

    /// 1-based row range shown on this page, or `None` for an empty page.
    pub fn row_range(&self) -> Option<(u64, u64)> {
        let p = &self.pagination;
        (p.returned_count > 0).then(|| (p.offset + 1, p.offset + p.returned_count))
    }
}

/// Listing and removal of enrolled identities.
pub trait IdentityRegistry: Send + Sync {
    fn list_users(&self, limit: u32, page: u32) -> Result<UserReport, RecognitionError>;

    /// Deletes every enrollment for `name`, returning how many users remain.
    fn delete_user(&self, name: &str) -> Result<u64, RecognitionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn report(total_pages: u32, offset: u64, returned: u64, users: usize) -> UserReport {
        UserReport {
            users: (0..users)
                .map(|i| EnrolledUser {
                    user_name: format!("user{i}"),
                    total_images: 20,
                    embedding_count: 20,
                    total_training_sessions: 1,
                    first_training: None,
                    last_training: None,
                })
                .collect(),
            pagination: Pagination {
                page: 1,
                total_pages,
                offset,
                returned_count: returned,
                has_previous: false,
                has_next: total_pages > 1,
            },
            total_users: 25,
            total_embeddings: 500,
        }
    }

    #[rstest]
    #[case::zero(0, false)]
    #[case::first(1, true)]
    #[case::last(3, true)]
    #[case::past_end(4, false)]
    fn test_page_in_range(#[case] page: u32, #[case] expected: bool) {
        assert_eq!(report(3, 0, 10, 10).page_in_range(page), expected);
    }

    #[test]
    fn test_row_range() {
        assert_eq!(report(3, 20, 5, 5).row_range(), Some((21, 25)));
        assert_eq!(report(0, 0, 0, 0).row_range(), None);
    }

    #[test]
    fn test_deserializes_backend_listing() {
        let json = r#"{
            "users": [{"userName": "alice", "total_images": 20, "embedding_count": 18,
                       "total_training_sessions": 2, "first_training": "2024-01-01T10:00:00",
                       "last_training": null}],
            "pagination": {"page": 1, "total_pages": 1, "offset": 0, "returned_count": 1,
                           "has_previous": false, "has_next": false},
            "total_users": 1,
            "total_embeddings": 18
        }"#;
        let report: UserReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.users[0].user_name, "alice");
        assert_eq!(report.users[0].embedding_count, 18);
        assert_eq!(report.users[0].last_training, None);
        assert_eq!(report.total_embeddings, 18);
    }
}
