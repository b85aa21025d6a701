use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::crm::CrmApi;

/// Reports which required fields a set of profiles does not collect
pub struct ProfileChecker {
    crm: Arc<dyn CrmApi>,
}

impl ProfileChecker {
    pub fn new(crm: Arc<dyn CrmApi>) -> Self {
        Self { crm }
    }

    /// Requested fields present in none of the profiles, in request order.
    ///
    /// `None` when either list is empty. A profile that cannot be read
    /// contributes no fields.
    pub async fn missing_profile_fields(
        &self,
        profile_ids: &[i64],
        check_fields: &[String],
    ) -> Option<Vec<String>> {
        if profile_ids.is_empty() || check_fields.is_empty() {
            return None;
        }

        let mut found = HashSet::new();
        for &profile_id in profile_ids.iter().filter(|id| **id > 0) {
            match self.crm.profile_field_names(profile_id).await {
                Ok(names) => found.extend(names),
                Err(err) => warn!("Reading fields of profile {} failed: {}", profile_id, err),
            }
        }

        let mut missing = Vec::new();
        for field in check_fields {
            if !found.contains(field) && !missing.contains(field) {
                missing.push(field.clone());
            }
        }

        debug!("Missing profile fields: {:?}", missing);
        Some(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_mock::MockCrm;
    use crate::error::CrmError;
    use mockall::predicate::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_missing_fields_across_profiles() {
        let mut crm = MockCrm::new();
        crm.expect_profile_field_names()
            .with(eq(1))
            .returning(|_| Ok(vec!["first_name".to_string(), "email-Primary".to_string()]));
        crm.expect_profile_field_names()
            .with(eq(2))
            .returning(|_| Ok(vec!["last_name".to_string()]));
        crm.expect_profile_field_names()
            .with(eq(3))
            .returning(|_| Err(CrmError::Decode("boom".into())));

        let checker = ProfileChecker::new(Arc::new(crm));
        let missing = checker
            .missing_profile_fields(
                &[1, 2, 3],
                &fields(&["first_name", "last_name", "email-Primary", "phone"]),
            )
            .await;
        assert_eq!(missing, Some(fields(&["phone"])));
    }

    #[tokio::test]
    async fn test_empty_inputs_give_none() {
        let checker = ProfileChecker::new(Arc::new(MockCrm::new()));
        assert!(checker.missing_profile_fields(&[], &fields(&["email"])).await.is_none());
        assert!(checker.missing_profile_fields(&[1], &[]).await.is_none());
    }
}
