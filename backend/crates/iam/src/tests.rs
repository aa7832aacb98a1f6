//! Service-level scenarios against the in-memory adapters

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use kernel::error::kind::ErrorKind;
use platform::clock::ManualClock;
use platform::password::PasswordCost;
use platform::random::SeededRandom;

use crate::application::{
    AuthService, ConfirmEmailInput, IamConfig, IamContext, NewTenant, Session, SignInInput,
    SignUpInput, SweepUseCase, TenantManagement, UserManagement,
};
use crate::domain::entity::{Tenant, TenantPatch, UserDetailPatch};
use crate::domain::page::PageRequest;
use crate::domain::principal::Principal;
use crate::domain::repository::IamStore;
use crate::domain::value_object::{Role, TenantId, UserId};
use crate::error::IamError;
use crate::infra::{InMemoryMailer, MemoryIamStore};

const PASSWORD: &str = "correct horse battery";

struct Harness {
    store: Arc<MemoryIamStore>,
    mailer: Arc<InMemoryMailer>,
    clock: Arc<ManualClock>,
    auth: AuthService<MemoryIamStore, InMemoryMailer>,
    users: UserManagement<MemoryIamStore>,
    tenants: TenantManagement<MemoryIamStore>,
    ctx: IamContext<MemoryIamStore>,
}

fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_735_689_600, 0).unwrap() // 2025-01-01
}

async fn harness() -> Harness {
    harness_with(MemoryIamStore::with_roles([Role::Custom("auditor".into())])).await
}

async fn harness_with(store: MemoryIamStore) -> Harness {
    let store = Arc::new(store);
    let mailer = Arc::new(InMemoryMailer::new());
    let clock = Arc::new(ManualClock::new(start()));
    let config = IamConfig {
        password_cost: PasswordCost::minimal(),
        confirmation_base_url: "https://id.example.com/".to_string(),
        ..IamConfig::with_random_secret()
    };
    let ctx = IamContext::new(store.clone(), Arc::new(config))
        .with_clock(clock.clone())
        .with_random(Arc::new(SeededRandom::new(42)));

    let mut tx = store.begin().await.unwrap();
    for (id, name) in [("acme", "Acme Corp"), ("globex", "Globex")] {
        let tenant = Tenant::new(id, name, "", start()).unwrap();
        store.insert_tenant(&mut tx, &tenant).await.unwrap();
    }
    store.commit(tx).await.unwrap();

    Harness {
        auth: AuthService::new(ctx.clone(), mailer.clone()),
        users: UserManagement::new(ctx.clone()),
        tenants: TenantManagement::new(ctx.clone()),
        store,
        mailer,
        clock,
        ctx,
    }
}

fn sign_up_input(email: &str, tenant: &str, source: &str) -> SignUpInput {
    SignUpInput {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        tenant_id: tenant.to_string(),
        source: source.to_string(),
    }
}

fn sign_in_input(email: &str, tenant: &str) -> SignInInput {
    SignInInput {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        tenant_id: tenant.to_string(),
    }
}

fn sysadmin() -> Principal {
    Principal::new(UserId::new("root"), TenantId::new("acme"), vec![Role::SysAdmin])
}

/// Secret carried by a confirmation mail body
fn code_from_body(body: &str) -> String {
    if let Some((_, rest)) = body.split_once("code=") {
        return rest.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
    }
    let (_, rest) = body.split_once("<strong>").unwrap();
    rest.split_once("</strong>").unwrap().0.to_string()
}

impl Harness {
    async fn last_code(&self, email: &str) -> String {
        let mail = self.mailer.last_to(email).await.unwrap();
        code_from_body(&mail.content.body)
    }

    async fn confirm(&self, user_id: &UserId, code: &str) -> Result<String, IamError> {
        self.auth
            .confirm_email(ConfirmEmailInput {
                user_id: user_id.to_string(),
                code: code.to_string(),
            })
            .await
    }

    /// Signed up and confirmed user
    async fn verified_user(&self, email: &str, tenant: &str) -> UserId {
        let out = self.auth.sign_up(sign_up_input(email, tenant, "web")).await.unwrap();
        let code = self.last_code(email).await;
        self.confirm(&out.user_id, &code).await.unwrap();
        out.user_id
    }

    async fn sign_in(&self, email: &str, tenant: &str) -> Session {
        self.auth.sign_in(sign_in_input(email, tenant)).await.unwrap()
    }

    async fn grant(&self, user_id: &UserId, role: Role) {
        let mut tx = self.store.begin().await.unwrap();
        self.store.assign_role(&mut tx, user_id, &role).await.unwrap();
        self.store.commit(tx).await.unwrap();
    }

    fn principal(&self, session: &Session) -> Principal {
        self.auth
            .authenticate(&format!("Bearer {}", session.access_token))
            .unwrap()
    }
}

// ============================================================================
// Sign-up and confirmation
// ============================================================================

#[tokio::test]
async fn test_web_sign_up_sends_confirmation_link() {
    let h = harness().await;

    let out = h
        .auth
        .sign_up(sign_up_input("Ada@Example.com", "acme", "web"))
        .await
        .unwrap();
    assert_eq!(
        out.message,
        "User account created successfully. Please check your email to confirm your account."
    );

    let mail = h.mailer.last_to("ada@example.com").await.unwrap();
    assert_eq!(mail.content.content_type, "text/html");
    assert_eq!(mail.content.title, "Confirm Your Email Address - IAM");
    assert!(mail.content.body.contains(&format!(
        "https://id.example.com/api/v1/auth/confirm-email?userId={}&code=",
        out.user_id
    )));

    let code = code_from_body(&mail.content.body);
    assert_eq!(code.len(), 64);

    // Stored only as a hash
    let row = h.store.confirmation_for(&out.user_id).await.unwrap();
    assert_ne!(row.code_hash, code);
    assert_eq!(row.expires_at, start() + Duration::hours(24));
}

#[tokio::test]
async fn test_mobile_sign_up_sends_six_digit_code() {
    let h = harness().await;

    h.auth
        .sign_up(sign_up_input("droid@example.com", "acme", "android"))
        .await
        .unwrap();
    h.auth
        .sign_up(sign_up_input("phone@example.com", "acme", "iOS"))
        .await
        .unwrap();

    let android = h.mailer.last_to("droid@example.com").await.unwrap();
    assert_eq!(android.content.title, "Your Confirmation Code - IAM (Android)");
    let code = code_from_body(&android.content.body);
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));

    let ios = h.mailer.last_to("phone@example.com").await.unwrap();
    assert_eq!(ios.content.title, "Your Confirmation Code - IAM (iOS)");
}

#[tokio::test]
async fn test_sign_up_validation_happens_before_io() {
    let h = harness().await;

    let cases = [
        sign_up_input("", "acme", "web"),
        sign_up_input("not-an-email", "acme", "web"),
        sign_up_input("a@example.com", "", "web"),
        sign_up_input("a@example.com", "acme", "desktop"),
        SignUpInput {
            password: "short".to_string(),
            ..sign_up_input("a@example.com", "acme", "web")
        },
        SignUpInput {
            first_name: "   ".to_string(),
            ..sign_up_input("a@example.com", "acme", "web")
        },
    ];
    for input in cases {
        let err = h.auth.sign_up(input).await.unwrap_err();
        assert!(matches!(err, IamError::InvalidInput(_)), "got {err:?}");
    }
    assert!(h.mailer.sent().await.is_empty());
}

#[tokio::test]
async fn test_sign_up_requires_existing_tenant() {
    let h = harness().await;

    let err = h
        .auth
        .sign_up(sign_up_input("a@example.com", "initech", "web"))
        .await
        .unwrap_err();
    assert!(matches!(err, IamError::TenantNotFound));
    assert!(h.mailer.sent().await.is_empty());
}

#[tokio::test]
async fn test_mail_failure_rolls_back_sign_up() {
    let h = harness().await;
    h.mailer.set_failing(true);

    let err = h
        .auth
        .sign_up(sign_up_input("a@example.com", "acme", "web"))
        .await
        .unwrap_err();
    assert!(matches!(err, IamError::Mailer(_)));
    assert_eq!(err.to_app_error().message(), "internal error");

    // Nothing was persisted
    let err = h.auth.sign_in(sign_in_input("a@example.com", "acme")).await.unwrap_err();
    assert!(matches!(err, IamError::InvalidCredentials));

    h.mailer.set_failing(false);
    h.auth
        .sign_up(sign_up_input("a@example.com", "acme", "web"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_verified_email_is_duplicate_within_tenant_only() {
    let h = harness().await;
    h.verified_user("a@example.com", "acme").await;

    let err = h
        .auth
        .sign_up(sign_up_input("a@example.com", "acme", "web"))
        .await
        .unwrap_err();
    assert!(matches!(err, IamError::DuplicateAccount));

    // Same address in another tenant is a different identity
    h.verified_user("a@example.com", "globex").await;
}

#[tokio::test]
async fn test_unverified_sign_up_is_replaced() {
    let h = harness().await;

    let first = h
        .auth
        .sign_up(sign_up_input("a@example.com", "acme", "web"))
        .await
        .unwrap();
    let first_code = h.last_code("a@example.com").await;

    let second = h
        .auth
        .sign_up(sign_up_input("a@example.com", "acme", "android"))
        .await
        .unwrap();
    assert_ne!(first.user_id, second.user_id);

    // The first account and its code are gone
    let err = h.confirm(&first.user_id, &first_code).await.unwrap_err();
    assert!(matches!(err, IamError::ConfirmationNotFound));

    let code = h.last_code("a@example.com").await;
    h.confirm(&second.user_id, &code).await.unwrap();
    h.sign_in("a@example.com", "acme").await;
}

#[tokio::test]
async fn test_confirmation_is_single_use() {
    let h = harness().await;
    let out = h
        .auth
        .sign_up(sign_up_input("a@example.com", "acme", "web"))
        .await
        .unwrap();
    let code = h.last_code("a@example.com").await;

    let message = h.confirm(&out.user_id, &code).await.unwrap();
    assert_eq!(message, "Email confirmed successfully. You can now sign in.");

    let err = h.confirm(&out.user_id, &code).await.unwrap_err();
    assert!(matches!(err, IamError::ConfirmationAlreadyUsed));

    // Still verified
    h.sign_in("a@example.com", "acme").await;
}

#[tokio::test]
async fn test_confirmation_outcomes() {
    let h = harness().await;
    let out = h
        .auth
        .sign_up(sign_up_input("a@example.com", "acme", "ios"))
        .await
        .unwrap();
    let code = h.last_code("a@example.com").await;

    let wrong = if code == "000000" { "111111" } else { "000000" };
    let err = h.confirm(&out.user_id, wrong).await.unwrap_err();
    assert!(matches!(err, IamError::ConfirmationNotFound));

    // Code bound to its user
    let err = h.confirm(&UserId::new("someone-else"), &code).await.unwrap_err();
    assert!(matches!(err, IamError::ConfirmationNotFound));

    let err = h.confirm(&out.user_id, "").await.unwrap_err();
    assert!(matches!(err, IamError::InvalidInput(_)));

    h.clock.advance(Duration::hours(24));
    let err = h.confirm(&out.user_id, &code).await.unwrap_err();
    assert!(matches!(err, IamError::ConfirmationExpired));

    let err = h.auth.sign_in(sign_in_input("a@example.com", "acme")).await.unwrap_err();
    assert!(matches!(err, IamError::EmailNotVerified));
}

// ============================================================================
// Sign-in
// ============================================================================

#[tokio::test]
async fn test_sign_in_issues_bearer_session() {
    let h = harness().await;
    let user_id = h.verified_user("a@example.com", "acme").await;

    let session = h.sign_in("A@example.com", "acme").await;
    assert_eq!(session.token_type, "Bearer");
    assert_eq!(session.expires_in, 3600);
    assert_eq!(session.user_id, user_id);
    assert_ne!(session.access_token, session.refresh_token);

    let principal = h.principal(&session);
    assert_eq!(principal.user_id, user_id);
    assert_eq!(principal.tenant_id, TenantId::new("acme"));
    assert_eq!(principal.roles, vec![Role::User]);
}

#[tokio::test]
async fn test_sign_in_failures_are_coarse() {
    let h = harness().await;
    h.verified_user("a@example.com", "acme").await;

    let wrong_password = SignInInput {
        password: "not the password".to_string(),
        ..sign_in_input("a@example.com", "acme")
    };
    let err = h.auth.sign_in(wrong_password).await.unwrap_err();
    assert!(matches!(err, IamError::InvalidCredentials));

    let err = h.auth.sign_in(sign_in_input("b@example.com", "acme")).await.unwrap_err();
    assert!(matches!(err, IamError::InvalidCredentials));
    assert_eq!(err.to_app_error().message(), "invalid credentials");

    let err = h.auth.sign_in(sign_in_input("a@example.com", "")).await.unwrap_err();
    assert!(matches!(err, IamError::InvalidInput(_)));
}

#[tokio::test]
async fn test_tenant_gating() {
    let h = harness().await;
    h.verified_user("a@example.com", "acme").await;

    let err = h.auth.sign_in(sign_in_input("a@example.com", "initech")).await.unwrap_err();
    assert!(matches!(err, IamError::TenantNotFound));

    // An unknown tenant wins over a malformed address
    let err = h.auth.sign_in(sign_in_input("not-an-email", "initech")).await.unwrap_err();
    assert!(matches!(err, IamError::TenantNotFound));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h.auth.sign_in(sign_in_input("not-an-email", "acme")).await.unwrap_err();
    assert!(matches!(err, IamError::InvalidCredentials));

    // Valid credentials, wrong tenant
    let err = h.auth.sign_in(sign_in_input("a@example.com", "globex")).await.unwrap_err();
    assert!(matches!(err, IamError::InvalidCredentials));
}

// ============================================================================
// Tokens, refresh and sign-out
// ============================================================================

#[tokio::test]
async fn test_refresh_token_rotation() {
    let h = harness().await;
    h.verified_user("a@example.com", "acme").await;
    let first = h.sign_in("a@example.com", "acme").await;

    let second = h.auth.refresh(&first.refresh_token).await.unwrap();
    assert_ne!(second.refresh_token, first.refresh_token);

    let err = h.auth.refresh(&first.refresh_token).await.unwrap_err();
    assert!(matches!(err, IamError::InvalidToken));

    let third = h.auth.refresh(&second.refresh_token).await.unwrap();
    let err = h.auth.refresh(&second.refresh_token).await.unwrap_err();
    assert!(matches!(err, IamError::InvalidToken));

    h.auth.refresh(&third.refresh_token).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_refresh_has_one_winner() {
    let h = harness().await;
    h.verified_user("a@example.com", "acme").await;
    let session = h.sign_in("a@example.com", "acme").await;

    let (a, b) = tokio::join!(
        h.auth.refresh(&session.refresh_token),
        h.auth.refresh(&session.refresh_token)
    );
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
}

#[tokio::test]
async fn test_token_types_are_not_interchangeable() {
    let h = harness().await;
    let user_id = h.verified_user("a@example.com", "acme").await;
    let session = h.sign_in("a@example.com", "acme").await;

    assert_eq!(h.auth.validate_access(&session.access_token).unwrap(), user_id);

    let err = h.auth.validate_access(&session.refresh_token).unwrap_err();
    assert!(matches!(err, IamError::InvalidToken));

    let err = h.auth.refresh(&session.access_token).await.unwrap_err();
    assert!(matches!(err, IamError::InvalidToken));

    let err = h.auth.authenticate("Bearer garbage").unwrap_err();
    assert!(matches!(err, IamError::InvalidToken));
}

#[tokio::test]
async fn test_tokens_expire_with_the_clock() {
    let h = harness().await;
    h.verified_user("a@example.com", "acme").await;
    let session = h.sign_in("a@example.com", "acme").await;

    h.clock.advance(Duration::minutes(59));
    h.auth.validate_access(&session.access_token).unwrap();

    h.clock.advance(Duration::minutes(1));
    assert!(h.auth.validate_access(&session.access_token).is_err());

    // The refresh token outlives the access token
    let renewed = h.auth.refresh(&session.refresh_token).await.unwrap();

    h.clock.advance(Duration::days(30));
    let err = h.auth.refresh(&renewed.refresh_token).await.unwrap_err();
    assert!(matches!(err, IamError::InvalidToken));
}

#[tokio::test]
async fn test_refresh_picks_up_role_changes() {
    let h = harness().await;
    let user_id = h.verified_user("a@example.com", "acme").await;
    let session = h.sign_in("a@example.com", "acme").await;
    assert!(!h.principal(&session).is_admin());

    h.users
        .assign_role(&sysadmin(), user_id.as_str(), "admin")
        .await
        .unwrap();

    // Old access token still carries the old roles
    assert!(!h.principal(&session).is_admin());

    let renewed = h.auth.refresh(&session.refresh_token).await.unwrap();
    let principal = h.principal(&renewed);
    assert!(principal.is_admin());
    assert!(principal.roles.contains(&Role::User));
}

#[tokio::test]
async fn test_live_sessions_are_bounded() {
    let h = harness().await;
    let user_id = h.verified_user("a@example.com", "acme").await;

    let mut sessions = Vec::new();
    for _ in 0..5 {
        sessions.push(h.sign_in("a@example.com", "acme").await);
        h.clock.advance(Duration::seconds(1));
    }
    assert_eq!(h.store.refresh_token_rows(&user_id).await, 2);

    let mut usable = 0;
    for session in &sessions {
        if h.auth.refresh(&session.refresh_token).await.is_ok() {
            usable += 1;
        }
    }
    assert_eq!(usable, 2);
}

#[tokio::test]
async fn test_sign_out_revokes_every_refresh_token() {
    let h = harness().await;
    let user_id = h.verified_user("a@example.com", "acme").await;

    let mut sessions = Vec::new();
    for _ in 0..3 {
        sessions.push(h.sign_in("a@example.com", "acme").await);
    }
    // The session cap applies before sign-out: only the two newest are live
    assert_eq!(h.store.refresh_token_rows(&user_id).await, 2);
    let err = h.auth.refresh(&sessions[0].refresh_token).await.unwrap_err();
    assert!(matches!(err, IamError::InvalidToken));

    assert_eq!(h.auth.sign_out(&user_id).await.unwrap(), 2);

    for session in &sessions {
        let err = h.auth.refresh(&session.refresh_token).await.unwrap_err();
        assert!(matches!(err, IamError::InvalidToken));
    }
    // Access tokens run until they expire
    h.auth.validate_access(&sessions[2].access_token).unwrap();
}

#[tokio::test]
async fn test_sweep_removes_dead_rows() {
    let h = harness().await;
    let user_id = h.verified_user("a@example.com", "acme").await;
    h.sign_in("a@example.com", "acme").await;
    h.sign_in("a@example.com", "acme").await;
    h.auth.sign_out(&user_id).await.unwrap();

    let report = SweepUseCase::new(h.ctx.clone()).execute().await.unwrap();
    assert_eq!(report.refresh_tokens, 2);
    assert_eq!(report.confirmations, 1);
    assert_eq!(h.store.refresh_token_rows(&user_id).await, 0);
    assert!(h.store.confirmation_for(&user_id).await.is_none());

    let again = SweepUseCase::new(h.ctx.clone()).execute().await.unwrap();
    assert_eq!(again.refresh_tokens + again.confirmations, 0);
}

// ============================================================================
// User management
// ============================================================================

#[tokio::test]
async fn test_fetch_user_permissions() {
    let h = harness().await;
    let ada = h.verified_user("ada@example.com", "acme").await;
    let bob = h.verified_user("bob@example.com", "acme").await;
    let eve = h.verified_user("eve@example.com", "globex").await;
    h.grant(&eve, Role::Admin).await;

    let ada_p = h.principal(&h.sign_in("ada@example.com", "acme").await);
    let eve_p = h.principal(&h.sign_in("eve@example.com", "globex").await);

    let me = h.users.load_user(&ada_p, ada.as_str()).await.unwrap();
    assert_eq!(me.first_name, "Ada");

    let err = h.users.load_user(&ada_p, bob.as_str()).await.unwrap_err();
    assert!(matches!(err, IamError::NoPermissions(_)));

    // Admin of another tenant
    let err = h.users.load_user(&eve_p, bob.as_str()).await.unwrap_err();
    assert!(matches!(err, IamError::NoPermissions(_)));

    h.users.load_user(&sysadmin(), bob.as_str()).await.unwrap();

    let err = h.users.load_user(&sysadmin(), "missing").await.unwrap_err();
    assert!(matches!(err, IamError::UserNotFound));
}

#[tokio::test]
async fn test_list_users() {
    let h = harness().await;
    let ada = h.verified_user("ada@example.com", "acme").await;
    h.verified_user("bob@example.com", "acme").await;
    h.verified_user("cy@example.com", "acme").await;
    h.verified_user("eve@example.com", "globex").await;
    h.grant(&ada, Role::Admin).await;

    let admin = h.principal(&h.sign_in("ada@example.com", "acme").await);
    let page = h
        .users
        .list_users_by_tenant(&admin, "acme", PageRequest::new(1, 2))
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total_pages, 2);

    // A plain user only sees itself
    let bob = h.principal(&h.sign_in("bob@example.com", "acme").await);
    let own = h
        .users
        .list_users_by_tenant(&bob, "acme", PageRequest::new(0, 0))
        .await
        .unwrap();
    assert_eq!(own.items.len(), 1);
    assert_eq!(own.items[0].user_id, bob.user_id);

    let foreign = h
        .users
        .list_users_by_tenant(&admin, "globex", PageRequest::new(1, 10))
        .await
        .unwrap();
    assert!(foreign.items.is_empty());

    let err = h
        .users
        .list_all_users(&admin, PageRequest::new(1, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, IamError::NoPermissions(_)));

    let all = h
        .users
        .list_all_users(&sysadmin(), PageRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(all.total, 4);
}

#[tokio::test]
async fn test_role_assignment_rules() {
    let h = harness().await;
    let ada = h.verified_user("ada@example.com", "acme").await;
    let bob = h.verified_user("bob@example.com", "acme").await;
    h.grant(&ada, Role::Admin).await;
    let admin = h.principal(&h.sign_in("ada@example.com", "acme").await);
    let plain = h.principal(&h.sign_in("bob@example.com", "acme").await);

    let err = h.users.assign_role(&plain, ada.as_str(), "admin").await.unwrap_err();
    assert!(matches!(err, IamError::NoPermissions(_)));

    let err = h.users.assign_role(&admin, bob.as_str(), "sysadmin").await.unwrap_err();
    assert!(matches!(err, IamError::NoPermissions(_)));

    let err = h.users.assign_role(&admin, bob.as_str(), "pilot").await.unwrap_err();
    assert!(matches!(err, IamError::RoleNotFound(_)));

    h.users.assign_role(&admin, bob.as_str(), "auditor").await.unwrap();
    let err = h.users.assign_role(&admin, bob.as_str(), "auditor").await.unwrap_err();
    assert!(matches!(err, IamError::RoleAlreadyAssigned(_)));

    let roles = h.users.get_user_roles(&plain, bob.as_str()).await.unwrap();
    assert!(roles.roles.contains(&Role::Custom("auditor".into())));

    h.users.remove_role(&admin, bob.as_str(), "auditor").await.unwrap();
    let err = h.users.remove_role(&admin, bob.as_str(), "auditor").await.unwrap_err();
    assert!(matches!(err, IamError::RoleNotAssigned(_)));
}

#[tokio::test]
async fn test_update_user_details() {
    let h = harness().await;
    let ada = h.verified_user("ada@example.com", "acme").await;
    let me = h.principal(&h.sign_in("ada@example.com", "acme").await);

    let updated = h
        .users
        .update_user_details(
            &me,
            ada.as_str(),
            UserDetailPatch {
                first_name: Some("  Augusta ".to_string()),
                last_name: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.first_name, "Augusta");
    assert_eq!(updated.last_name, "Lovelace");

    let err = h
        .users
        .update_user_details(
            &me,
            ada.as_str(),
            UserDetailPatch {
                first_name: Some(" ".to_string()),
                last_name: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, IamError::InvalidInput(_)));
}

#[tokio::test]
async fn test_change_password_ends_sessions() {
    let h = harness().await;
    let ada = h.verified_user("ada@example.com", "acme").await;
    let session = h.sign_in("ada@example.com", "acme").await;
    let me = h.principal(&session);

    let err = h
        .users
        .change_password(&me, ada.as_str(), Some("wrong guess".into()), "new secret words".into())
        .await
        .unwrap_err();
    assert!(matches!(err, IamError::InvalidCredentials));

    h.users
        .change_password(&me, ada.as_str(), Some(PASSWORD.into()), "new secret words".into())
        .await
        .unwrap();

    let err = h.auth.refresh(&session.refresh_token).await.unwrap_err();
    assert!(matches!(err, IamError::InvalidToken));

    assert!(
        h.users
            .validate_user_password_matches(ada.as_str(), "new secret words".into())
            .await
            .unwrap()
    );
    assert!(
        !h.users
            .validate_user_password_matches(ada.as_str(), PASSWORD.into())
            .await
            .unwrap()
    );

    // Sysadmin resets without the current password
    h.users
        .change_password(&sysadmin(), ada.as_str(), None, PASSWORD.into())
        .await
        .unwrap();
    h.sign_in("ada@example.com", "acme").await;
}

#[tokio::test]
async fn test_delete_user() {
    let h = harness().await;
    let ada = h.verified_user("ada@example.com", "acme").await;
    let bob = h.verified_user("bob@example.com", "acme").await;
    h.grant(&ada, Role::Admin).await;
    let admin = h.principal(&h.sign_in("ada@example.com", "acme").await);
    let session = h.sign_in("bob@example.com", "acme").await;

    h.users.delete_user(&admin, bob.as_str()).await.unwrap();

    let err = h.auth.sign_in(sign_in_input("bob@example.com", "acme")).await.unwrap_err();
    assert!(matches!(err, IamError::InvalidCredentials));
    let err = h.auth.refresh(&session.refresh_token).await.unwrap_err();
    assert!(matches!(err, IamError::InvalidToken));
    assert_eq!(h.store.refresh_token_rows(&bob).await, 0);
}

// ============================================================================
// Tenant management
// ============================================================================

#[tokio::test]
async fn test_tenant_lifecycle() {
    let h = harness().await;
    let root = sysadmin();

    let tenant = h
        .tenants
        .create_tenant(
            &root,
            NewTenant {
                id: "initech".to_string(),
                name: "Initech".to_string(),
                description: "TPS reports".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(tenant.tenant_id, TenantId::new("initech"));

    let err = h
        .tenants
        .create_tenant(
            &root,
            NewTenant {
                id: "initech".to_string(),
                name: "Again".to_string(),
                description: String::new(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, IamError::DuplicateTenant));

    let err = h
        .tenants
        .create_tenant(
            &root,
            NewTenant {
                id: "x".to_string(),
                name: "Too short".to_string(),
                description: String::new(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, IamError::InvalidInput(_)));

    let updated = h
        .tenants
        .update_tenant(
            &root,
            "initech",
            TenantPatch {
                name: Some("Initech LLC".to_string()),
                description: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Initech LLC");
    assert_eq!(updated.description, "TPS reports");

    assert_eq!(h.tenants.list_tenants(&root).await.unwrap().len(), 3);

    h.tenants.delete_tenant(&root, "initech").await.unwrap();
    let err = h.tenants.get_tenant(&root, "initech").await.unwrap_err();
    assert!(matches!(err, IamError::TenantNotFound));
}

#[tokio::test]
async fn test_tenant_permissions() {
    let h = harness().await;
    let ada = h.verified_user("ada@example.com", "acme").await;
    h.grant(&ada, Role::Admin).await;
    let admin = h.principal(&h.sign_in("ada@example.com", "acme").await);

    let err = h
        .tenants
        .create_tenant(
            &admin,
            NewTenant {
                id: "initech".to_string(),
                name: "Initech".to_string(),
                description: String::new(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, IamError::NoPermissions(_)));

    let visible = h.tenants.list_tenants(&admin).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].tenant_id, TenantId::new("acme"));

    let err = h.tenants.get_tenant(&admin, "globex").await.unwrap_err();
    assert!(matches!(err, IamError::NoPermissions(_)));

    let err = h
        .tenants
        .update_tenant(&admin, "globex", TenantPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, IamError::NoPermissions(_)));

    // Own tenant still has users
    let err = h.tenants.delete_tenant(&admin, "acme").await.unwrap_err();
    assert!(matches!(err, IamError::TenantHasUsers));
}
