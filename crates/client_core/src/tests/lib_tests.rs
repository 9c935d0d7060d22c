use super::*;
use crate::test_support::{
    operator, settings_fast_polling, settings_immediate_only, wait_until, FakeBackend,
    FakeDirectory,
};
use std::sync::atomic::Ordering;

async fn assert_signed_out_invariants(client: &TerminalClient) {
    let session = client.session().await;
    assert!(!session.is_authenticated());
    assert!(session.identity().is_none());
    assert_eq!(client.health().await, HealthSnapshot::default());
    assert_eq!(client.navigation().await, NavigationState::default());
}

fn drain(rx: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn blank_credentials_never_reach_the_backend() {
    let backend = FakeBackend::accepting(operator(Some("admin"), Some(7)));
    let client = TerminalClient::new(settings_immediate_only(), backend.clone());

    for (username, password) in [("alice", ""), ("alice", "   "), ("   ", "x"), ("", "")] {
        assert_eq!(
            client.login(username, password).await,
            Err(AuthError::MissingCredentials)
        );
    }

    assert_eq!(backend.login_call_count(), 0);
    assert_signed_out_invariants(&client).await;
}

#[tokio::test]
async fn rejected_login_reports_invalid_credentials_and_keeps_session() {
    let backend = FakeBackend::rejecting();
    let client = TerminalClient::new(settings_immediate_only(), backend.clone());
    let mut events = client.subscribe_events();

    assert_eq!(
        client.login("alice", "x").await,
        Err(AuthError::InvalidCredentials)
    );

    assert_eq!(backend.login_call_count(), 1);
    assert!(!client.monitor().is_active().await);
    assert_eq!(backend.server_calls.load(Ordering::SeqCst), 0);
    assert_signed_out_invariants(&client).await;
    assert!(drain(&mut events)
        .iter()
        .any(|event| matches!(event, ClientEvent::Denied(message) if message == "invalid credentials")));
}

#[tokio::test]
async fn login_trims_username_but_sends_password_verbatim() {
    let backend = FakeBackend::accepting(operator(None, None));
    let client = TerminalClient::new(settings_immediate_only(), backend.clone());

    client.login("  alice \t", " pa ss ").await.expect("login");

    let calls = backend.login_calls.lock().expect("lock").clone();
    assert_eq!(calls, vec![("alice".to_string(), " pa ss ".to_string())]);
}

#[tokio::test]
async fn successful_login_commits_identity_and_checks_both_services_immediately() {
    let backend = FakeBackend::accepting(operator(Some("admin"), Some(7)));
    let client = TerminalClient::new(settings_immediate_only(), backend.clone());

    let identity = client.login("alice", "x").await.expect("login");
    assert_eq!(identity.emitter_id, Some(EmitterId(7)));

    let session = client.session().await;
    assert!(session.is_authenticated());
    assert_eq!(session.identity(), Some(&identity));

    wait_until("immediate checks", || async {
        client.health().await
            == HealthSnapshot {
                server: HealthStatus::Healthy,
                printer: HealthStatus::Healthy,
            }
    })
    .await;
    assert_eq!(backend.server_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.printer_call_ids(), vec![EmitterId(7)]);
}

#[tokio::test]
async fn login_while_signed_in_is_refused_locally() {
    let backend = FakeBackend::accepting(operator(Some("admin"), Some(7)));
    let client = TerminalClient::new(settings_immediate_only(), backend.clone());
    client.login("alice", "x").await.expect("login");

    assert_eq!(
        client.login("bob", "y").await,
        Err(AuthError::AlreadyAuthenticated)
    );
    assert_eq!(backend.login_call_count(), 1);
    assert_eq!(
        client.session().await.identity().map(|i| i.username.clone()),
        Some("alice".to_string())
    );
}

#[tokio::test]
async fn submit_login_clears_form_only_on_success() {
    let backend = FakeBackend::rejecting();
    let client = TerminalClient::new(settings_immediate_only(), backend.clone());

    let mut form = LoginForm::new();
    form.set_username("alice");
    form.set_password("wrong");
    assert_eq!(
        client.submit_login(&mut form).await,
        Err(AuthError::InvalidCredentials)
    );
    assert_eq!(form.username(), "alice");

    *backend.login_result.lock().expect("lock") = Some(operator(None, None));
    client.submit_login(&mut form).await.expect("login");
    assert!(form.is_empty());
}

#[tokio::test]
async fn login_resets_navigation_left_by_previous_session() {
    let backend = FakeBackend::accepting(operator(Some("admin"), Some(7)));
    let client = TerminalClient::new(settings_immediate_only(), backend);
    client.login("alice", "x").await.expect("login");
    client.select_area(Area::Settings).await.expect("settings");
    client.open_user_management().await.expect("users");

    client.logout().await;
    client.login("alice", "x").await.expect("login again");

    assert_eq!(client.navigation().await, NavigationState::default());
}

#[tokio::test]
async fn logout_resets_everything_and_is_idempotent() {
    let backend = FakeBackend::accepting(operator(Some("admin"), Some(7)));
    let client = TerminalClient::new(settings_immediate_only(), backend);
    let mut events = client.subscribe_events();

    client.logout().await;
    assert_signed_out_invariants(&client).await;
    assert!(drain(&mut events).is_empty());

    client.login("alice", "x").await.expect("login");
    client.select_area(Area::Receipt).await.expect("receipt");
    wait_until("server healthy", || async {
        client.health().await.server == HealthStatus::Healthy
    })
    .await;

    client.logout().await;
    assert_signed_out_invariants(&client).await;
    assert!(!client.monitor().is_active().await);

    client.logout().await;
    assert_signed_out_invariants(&client).await;

    let ended = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event, ClientEvent::SessionEnded))
        .count();
    assert_eq!(ended, 1);
}

#[tokio::test]
async fn responses_arriving_after_logout_are_discarded() {
    let backend = FakeBackend::accepting(operator(Some("admin"), Some(7)));
    let client = TerminalClient::new(settings_immediate_only(), backend.clone());
    backend.hold_responses();

    client.login("alice", "x").await.expect("login");
    wait_until("both checks in flight", || async {
        backend.held.load(Ordering::SeqCst) == 2
    })
    .await;

    client.logout().await;
    backend.release_responses();

    wait_until("stale results dropped", || async {
        client.monitor().discarded_results() == 2
    })
    .await;
    assert_signed_out_invariants(&client).await;
}

#[tokio::test]
async fn stale_responses_do_not_leak_into_the_next_session() {
    let backend = FakeBackend::accepting(operator(Some("admin"), Some(7)));
    let client = TerminalClient::new(settings_immediate_only(), backend.clone());
    backend.hold_responses();

    client.login("alice", "x").await.expect("login");
    wait_until("first session checks in flight", || async {
        backend.held.load(Ordering::SeqCst) == 2
    })
    .await;
    client.logout().await;

    backend.server_ok.store(false, Ordering::SeqCst);
    backend.set_printer_online(Some(false));
    client.login("alice", "x").await.expect("login again");
    wait_until("second session checks in flight", || async {
        backend.held.load(Ordering::SeqCst) == 4
    })
    .await;

    backend.release_responses();
    wait_until("second session results applied", || async {
        client.health().await
            == HealthSnapshot {
                server: HealthStatus::Unhealthy,
                printer: HealthStatus::Unhealthy,
            }
    })
    .await;
    wait_until("first session results dropped", || async {
        client.monitor().discarded_results() == 2
    })
    .await;
}

#[tokio::test]
async fn operator_without_emitter_never_polls_printer() {
    let backend = FakeBackend::accepting(operator(Some("cashier"), None));
    let client = TerminalClient::new(settings_fast_polling(), backend.clone());

    client.login("alice", "x").await.expect("login");
    wait_until("a few server checks", || async {
        backend.server_calls.load(Ordering::SeqCst) >= 3
    })
    .await;

    assert!(backend.printer_call_ids().is_empty());
    let health = client.health().await;
    assert_eq!(health.server, HealthStatus::Healthy);
    assert_eq!(health.printer, HealthStatus::Unknown);
    client.logout().await;
}

#[tokio::test]
async fn cashier_is_refused_user_management_and_admin_is_allowed() {
    let backend = FakeBackend::accepting(operator(Some("cashier"), Some(7)));
    let client = TerminalClient::new(settings_immediate_only(), backend.clone());
    let mut events = client.subscribe_events();
    client.login("alice", "x").await.expect("login");
    client.select_area(Area::Settings).await.expect("settings");

    assert_eq!(
        client.activate_entry(SettingsEntry::Users).await,
        Err(AccessError::AuthorizationDenied)
    );
    assert_eq!(
        client.open_user_management().await,
        Err(AccessError::AuthorizationDenied)
    );
    assert_eq!(client.navigation().await.settings_view, SettingsView::Grid);
    assert!(drain(&mut events)
        .iter()
        .any(|event| matches!(event, ClientEvent::Denied(_))));

    client.logout().await;
    *backend.login_result.lock().expect("lock") = Some(operator(Some("admin"), Some(7)));
    client.login("alice", "x").await.expect("admin login");
    client.select_area(Area::Settings).await.expect("settings");
    client
        .activate_entry(SettingsEntry::Users)
        .await
        .expect("admin opens users");
    assert_eq!(
        client.navigation().await,
        NavigationState {
            area: Some(Area::Settings),
            settings_view: SettingsView::UserManagement,
        }
    );

    client.back().await;
    assert_eq!(client.navigation().await.settings_view, SettingsView::Grid);
}

#[tokio::test]
async fn user_management_is_unreachable_outside_settings() {
    let backend = FakeBackend::accepting(operator(Some("admin"), Some(7)));
    let client = TerminalClient::new(settings_immediate_only(), backend);
    client.login("alice", "x").await.expect("login");
    let mut events = client.subscribe_events();

    client
        .activate_entry(SettingsEntry::Users)
        .await
        .expect("no-op from home");
    assert_eq!(client.navigation().await, NavigationState::default());

    client.select_area(Area::Receipt).await.expect("receipt");
    client
        .open_user_management()
        .await
        .expect("no-op from receipt");
    assert_eq!(
        client.navigation().await,
        NavigationState {
            area: Some(Area::Receipt),
            settings_view: SettingsView::Grid,
        }
    );

    let views: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            ClientEvent::NavigationChanged(state) => Some(state.settings_view),
            _ => None,
        })
        .collect();
    assert_eq!(views, vec![SettingsView::Grid]);
}

#[tokio::test]
async fn navigation_requires_a_session() {
    let backend = FakeBackend::accepting(operator(Some("admin"), Some(7)));
    let client = TerminalClient::new(settings_immediate_only(), backend);

    assert_eq!(
        client.select_area(Area::Receipt).await,
        Err(AccessError::NotAuthenticated)
    );
    assert_eq!(
        client.open_user_management().await,
        Err(AccessError::NotAuthenticated)
    );
    assert_eq!(client.navigation().await, NavigationState::default());
}

#[tokio::test]
async fn inert_grid_entries_do_not_change_navigation() {
    let backend = FakeBackend::accepting(operator(Some("admin"), Some(7)));
    let client = TerminalClient::new(settings_immediate_only(), backend);
    client.login("alice", "x").await.expect("login");
    client.select_area(Area::Settings).await.expect("settings");
    let before = client.navigation().await;

    client
        .activate_entry(SettingsEntry::Payments)
        .await
        .expect("inert entry");
    client
        .activate_entry(SettingsEntry::Home)
        .await
        .expect("inert entry");
    assert_eq!(client.navigation().await, before);
}

#[tokio::test]
async fn user_admin_is_scoped_to_the_operator_emitter() {
    let backend = FakeBackend::accepting(operator(Some("admin"), Some(7)));
    let directory = Arc::new(FakeDirectory::default());
    let client = TerminalClient::new_with_dependencies(
        settings_immediate_only(),
        backend,
        directory.clone(),
    );
    client.login("alice", "x").await.expect("login");

    let created = client
        .create_user(CreateUserRequest {
            username: "  nuovo ".to_string(),
            password: "pass".to_string(),
            role: Some("cashier".to_string()),
            ..Default::default()
        })
        .await
        .expect("create");
    assert_eq!(created.username, "nuovo");
    assert_eq!(created.emitter_id, Some(EmitterId(7)));

    let users = client.list_users().await.expect("list");
    assert_eq!(users.len(), 1);
    assert_eq!(
        directory.listed_for.lock().expect("lock").clone(),
        vec![Some(EmitterId(7))]
    );

    client.delete_user(created.id).await.expect("delete");
    assert_eq!(
        directory.deleted.lock().expect("lock").clone(),
        vec![created.id]
    );
}

#[tokio::test]
async fn user_admin_refuses_non_admins_and_missing_emitter() {
    let backend = FakeBackend::accepting(operator(Some("cashier"), Some(7)));
    let directory = Arc::new(FakeDirectory::default());
    let client = TerminalClient::new_with_dependencies(
        settings_immediate_only(),
        backend.clone(),
        directory.clone(),
    );

    assert!(matches!(
        client.list_users().await,
        Err(UserAdminError::Access(AccessError::NotAuthenticated))
    ));

    client.login("alice", "x").await.expect("login");
    assert!(matches!(
        client.list_users().await,
        Err(UserAdminError::Access(AccessError::AuthorizationDenied))
    ));
    client.logout().await;

    *backend.login_result.lock().expect("lock") = Some(operator(Some("admin"), None));
    client.login("alice", "x").await.expect("login");
    assert!(matches!(
        client.list_users().await,
        Err(UserAdminError::Access(AccessError::MissingIssuerContext))
    ));
    assert!(directory.listed_for.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn user_admin_failures_surface_as_request_errors() {
    let backend = FakeBackend::accepting(operator(Some("admin"), Some(7)));
    let directory = Arc::new(FakeDirectory::default());
    directory.fail.store(true, Ordering::SeqCst);
    let client = TerminalClient::new_with_dependencies(
        settings_immediate_only(),
        backend,
        directory,
    );
    client.login("alice", "x").await.expect("login");

    match client.list_users().await {
        Err(UserAdminError::Request(message)) => assert!(message.contains("500")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn missing_directory_fails_cleanly() {
    let backend = FakeBackend::accepting(operator(Some("admin"), Some(7)));
    let client = TerminalClient::new(settings_immediate_only(), backend);
    client.login("alice", "x").await.expect("login");

    assert!(matches!(
        client.update_user(OperatorId(3), UpdateUserRequest::default()).await,
        Err(UserAdminError::Request(_))
    ));
}
