use crate::backend::{decode, decode_list, Backend, Collection, Query, SessionToken};
use crate::error::BackendError;
use crate::outcome::Outcome;
use crate::roles::INTERN;
use crate::types::{UpdateProfileRequest, UserProfile};

/// Look up the profile linked to an authentication identity
pub async fn get_user_profile(backend: &dyn Backend, session: &SessionToken, user_id: &str) -> Outcome<UserProfile> {
    let result = async {
        let list = backend
            .list_documents(session, Collection::Users, &[Query::equal("userId", user_id)])
            .await?;
        decode_list::<UserProfile>(list)
    }
    .await;

    match result {
        Ok(list) => match list.documents.into_iter().next() {
            Some(profile) => Outcome::Success(profile),
            None => Outcome::Failure("Profil bulunamadı".to_string()),
        },
        Err(e) => Outcome::settle("Get user profile", "Profil getirilemedi", Err(e)),
    }
}

/// Update the mutable part of a profile (the display name)
pub async fn update_user_profile(
    backend: &dyn Backend,
    session: &SessionToken,
    profile_id: &str,
    update: &UpdateProfileRequest,
) -> Outcome<UserProfile> {
    let result = async {
        let data = serde_json::json!({ "name": update.name });
        let doc = backend
            .update_document(session, Collection::Users, profile_id, data)
            .await?;
        decode::<UserProfile>(doc)
    }
    .await;
    Outcome::settle("Update user profile", "Profil güncellenemedi", result)
}

pub async fn get_total_interns(backend: &dyn Backend, session: &SessionToken) -> Outcome<u64> {
    let result: Result<u64, BackendError> = backend
        .list_documents(
            session,
            Collection::Users,
            &[Query::equal("role", INTERN), Query::limit(1)],
        )
        .await
        .map(|list| list.total);
    Outcome::settle("Get total interns", "Stajyer sayısı getirilemedi", result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::roles::Role;
    use serde_json::json;

    fn seed_profile(backend: &MemoryBackend, user_id: &str, name: &str, role: &str) {
        backend.seed_document(
            Collection::Users,
            json!({"$id": user_id, "userId": user_id, "name": name, "email": format!("{}@example.com", user_id), "role": role}),
        );
    }

    #[tokio::test]
    async fn test_get_user_profile() {
        let backend = MemoryBackend::new();
        let token = backend.seed_session("u1");
        seed_profile(&backend, "u1", "Ayşe", "stajyer");

        let profile = get_user_profile(&backend, &token, "u1").await.data().unwrap();
        assert_eq!(profile.name, "Ayşe");
        assert_eq!(profile.role, Role::Intern);
        assert_eq!(profile.collection_id.as_deref(), Some("users"));

        let missing = get_user_profile(&backend, &token, "nobody").await;
        assert_eq!(missing.error(), Some("Profil bulunamadı"));
    }

    #[tokio::test]
    async fn test_update_user_profile_changes_name_only() {
        let backend = MemoryBackend::new();
        let token = backend.seed_session("u1");
        seed_profile(&backend, "u1", "Ayşe", "stajyer");

        let updated = update_user_profile(&backend, &token, "u1", &UpdateProfileRequest { name: "Al".to_string() })
            .await
            .data()
            .unwrap();
        assert_eq!(updated.name, "Al");
        assert_eq!(updated.email, "u1@example.com");
        assert_eq!(updated.role, Role::Intern);
    }

    #[tokio::test]
    async fn test_total_interns_counts_only_interns() {
        let backend = MemoryBackend::new();
        let token = backend.seed_session("m1");
        seed_profile(&backend, "u1", "A", "stajyer");
        seed_profile(&backend, "u2", "B", "stajyer");
        seed_profile(&backend, "m1", "C", "yonetici");

        assert_eq!(get_total_interns(&backend, &token).await, Outcome::Success(2));
    }
}
