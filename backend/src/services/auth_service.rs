use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use tracing::{info, warn};

use crate::db::UserRepository;
use crate::errors::{is_unique_violation, AppError};
use crate::models::{NewUser, User};
use crate::validation::{LoginForm, RegisterForm};

const BAD_CREDENTIALS: &str = "Credenciais inválidas.";
const EMAIL_IN_USE: &str = "Este e-mail já está em uso.";

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn register(repo: &dyn UserRepository, form: RegisterForm) -> Result<User, AppError> {
    form.validate().map_err(AppError::Validation)?;

    let email = form.email.unwrap_or_default().trim().to_string();
    if repo.find_by_email(&email).await?.is_some() {
        return Err(AppError::invalid("email", EMAIL_IN_USE));
    }

    let password_hash = hash_password(&form.password.unwrap_or_default())?;
    let user = repo
        .insert(NewUser {
            name: form.name.unwrap_or_default().trim().to_string(),
            email,
            password_hash,
        })
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::invalid("email", EMAIL_IN_USE)
            } else {
                AppError::Db(e)
            }
        })?;

    info!("Registered user {}", user.id);
    Ok(user)
}

pub async fn authenticate(repo: &dyn UserRepository, form: LoginForm) -> Result<User, AppError> {
    let email = form.email.unwrap_or_default();
    let password = form.password.unwrap_or_default();

    match repo.find_by_email(email.trim()).await? {
        Some(user) if verify_password(&password, &user.password_hash) => Ok(user),
        _ => {
            warn!("Failed login attempt");
            Err(AppError::invalid("email", BAD_CREDENTIALS))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryStore;

    fn register_form(email: &str) -> RegisterForm {
        RegisterForm {
            name: Some("Consultor".into()),
            email: Some(email.into()),
            password: Some("senha-segura".into()),
        }
    }

    #[test]
    fn test_hash_round_trip() {
        let hash = hash_password("senha-segura").unwrap();
        assert!(verify_password("senha-segura", &hash));
        assert!(!verify_password("outra-senha", &hash));
        assert!(!verify_password("senha-segura", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let store = InMemoryStore::new();
        let user = register(&store, register_form("consultor@x.com")).await.unwrap();

        let logged_in = authenticate(
            &store,
            LoginForm {
                email: Some("consultor@x.com".into()),
                password: Some("senha-segura".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_rejected() {
        let store = InMemoryStore::new();
        register(&store, register_form("consultor@x.com")).await.unwrap();

        let err = register(&store, register_form("consultor@x.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.get("email") == Some(EMAIL_IN_USE)));
    }

    #[tokio::test]
    async fn test_unique_index_violation_on_register_is_an_email_error() {
        let store = InMemoryStore::new();
        register(&store, register_form("consultor@x.com")).await.unwrap();
        store.set_stale_lookups(true);

        let err = register(&store, register_form("consultor@x.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.get("email") == Some(EMAIL_IN_USE)));
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let store = InMemoryStore::new();
        register(&store, register_form("consultor@x.com")).await.unwrap();

        let err = authenticate(
            &store,
            LoginForm {
                email: Some("consultor@x.com".into()),
                password: Some("errada".into()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.get("email") == Some(BAD_CREDENTIALS)));
    }
}
