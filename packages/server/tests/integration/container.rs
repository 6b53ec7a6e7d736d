use std::sync::atomic::Ordering;

use ::common::{ChallengeType, ContainerLimitPolicy, ContainerStatus};
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use server::engine::{ContainerSettings, ErrorKind};
use server::entity::container;

use crate::common::{TestApp, routes, test_settings};

async fn containers_of(app: &TestApp, participation_id: i32) -> Vec<container::Model> {
    container::Entity::find()
        .filter(container::Column::ParticipationId.eq(participation_id))
        .all(&app.db)
        .await
        .unwrap()
}

mod creation {
    use super::*;

    #[tokio::test]
    async fn injects_the_instance_flag_and_records_the_container() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "pwn", ChallengeType::DynamicContainer)
            .await;
        app.create_instance(player.participation.id, chal.id).await;

        let row = app
            .containers
            .create_container(player.participation.id, chal.id, player.user_id)
            .await
            .unwrap();

        let created = app.driver.created();
        assert_eq!(created.len(), 1);
        let (runtime_id, spec) = &created[0];
        assert_eq!(&row.runtime_id, runtime_id);
        assert_eq!(spec.image, "ctf/challenge:latest");
        assert_eq!(spec.exposed_port, 8080);

        let loaded = server::engine::get_instance(&app.db, player.participation.id, chal.id)
            .await
            .unwrap();
        assert_eq!(spec.flag.as_deref(), loaded.flag_text());

        assert_eq!(row.status, ContainerStatus::Running);
        assert_eq!(row.public_host.as_deref(), Some("127.0.0.1"));
        assert!(row.expect_stop_at > row.started_at);
    }

    #[tokio::test]
    async fn second_request_returns_the_existing_container() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "pwn", ChallengeType::StaticContainer)
            .await;
        app.add_flag(chal.id, "flag{static}", None).await;
        app.create_instance(player.participation.id, chal.id).await;

        let first = app
            .containers
            .create_container(player.participation.id, chal.id, player.user_id)
            .await
            .unwrap();
        let second = app
            .containers
            .create_container(player.participation.id, chal.id, player.user_id)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(app.driver.created().len(), 1);
        assert_eq!(app.driver.created()[0].1.flag, None);
    }

    #[tokio::test]
    async fn attachment_challenge_is_denied() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "misc", ChallengeType::StaticAttachment)
            .await;
        app.create_instance(player.participation.id, chal.id).await;

        let err = app
            .containers
            .create_container(player.participation.id, chal.id, player.user_id)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Denied);
        assert!(app.driver.created().is_empty());
    }

    #[tokio::test]
    async fn driver_failure_leaves_no_row() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "pwn", ChallengeType::DynamicContainer)
            .await;
        app.create_instance(player.participation.id, chal.id).await;
        app.driver.fail_create.store(true, Ordering::SeqCst);

        let err = app
            .containers
            .create_container(player.participation.id, chal.id, player.user_id)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Failed);
        assert!(containers_of(&app, player.participation.id).await.is_empty());
    }

    #[tokio::test]
    async fn cooldown_rejects_back_to_back_operations() {
        let app = TestApp::spawn_with(ContainerSettings {
            operation_cooldown: Duration::minutes(5),
            ..Default::default()
        })
        .await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "pwn", ChallengeType::DynamicContainer)
            .await;
        app.create_instance(player.participation.id, chal.id).await;

        app.containers
            .create_container(player.participation.id, chal.id, player.user_id)
            .await
            .unwrap();
        let err = app
            .containers
            .destroy_for_instance(player.participation.id, chal.id)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Denied);
        assert_eq!(containers_of(&app, player.participation.id).await.len(), 1);
    }
}

mod limits {
    use super::*;

    async fn setup_two_challenges(app: &TestApp) -> (i32, crate::common::Player, i32, i32) {
        let game = app.create_game().await;
        app.update_game(&game, |g| g.container_count_limit = Set(1))
            .await;
        let player = app.create_player(game.id, "alpha").await;
        let first = app
            .create_challenge(game.id, "pwn-1", ChallengeType::DynamicContainer)
            .await;
        let second = app
            .create_challenge(game.id, "pwn-2", ChallengeType::DynamicContainer)
            .await;
        app.create_instance(player.participation.id, first.id).await;
        app.create_instance(player.participation.id, second.id).await;
        (game.id, player, first.id, second.id)
    }

    #[tokio::test]
    async fn evict_policy_destroys_the_oldest_container() {
        let app = TestApp::spawn().await;
        let (_, player, first, second) = setup_two_challenges(&app).await;

        let old = app
            .containers
            .create_container(player.participation.id, first, player.user_id)
            .await
            .unwrap();
        let new = app
            .containers
            .create_container(player.participation.id, second, player.user_id)
            .await
            .unwrap();

        assert_eq!(app.driver.destroyed(), vec![old.runtime_id.clone()]);
        let rows = containers_of(&app, player.participation.id).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, new.id);
    }

    #[tokio::test]
    async fn failed_create_after_eviction_keeps_the_eviction() {
        let app = TestApp::spawn().await;
        let (_, player, first, second) = setup_two_challenges(&app).await;

        let old = app
            .containers
            .create_container(player.participation.id, first, player.user_id)
            .await
            .unwrap();
        app.driver.fail_create.store(true, Ordering::SeqCst);
        let err = app
            .containers
            .create_container(player.participation.id, second, player.user_id)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Failed);
        assert_eq!(app.driver.destroyed(), vec![old.runtime_id.clone()]);
        assert!(containers_of(&app, player.participation.id).await.is_empty());

        app.driver.fail_create.store(false, Ordering::SeqCst);
        app.containers
            .create_container(player.participation.id, second, player.user_id)
            .await
            .unwrap();
        assert_eq!(app.driver.destroyed().len(), 1);
    }

    #[tokio::test]
    async fn reject_policy_refuses_a_new_container() {
        let app = TestApp::spawn_with(ContainerSettings {
            limit_policy: ContainerLimitPolicy::Reject,
            ..test_settings()
        })
        .await;
        let (_, player, first, second) = setup_two_challenges(&app).await;

        app.containers
            .create_container(player.participation.id, first, player.user_id)
            .await
            .unwrap();
        let err = app
            .containers
            .create_container(player.participation.id, second, player.user_id)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Denied);
        assert!(app.driver.destroyed().is_empty());
        assert_eq!(app.driver.created().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_creations_respect_the_limit() {
        let app = TestApp::spawn_with(ContainerSettings {
            limit_policy: ContainerLimitPolicy::Reject,
            ..test_settings()
        })
        .await;
        let (_, player, first, second) = setup_two_challenges(&app).await;

        let pid = player.participation.id;
        let uid = player.user_id;
        let (a, b) = tokio::join!(
            app.containers.create_container(pid, first, uid),
            app.containers.create_container(pid, second, uid),
        );

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert_eq!(containers_of(&app, pid).await.len(), 1);
    }
}

mod destruction {
    use super::*;

    #[tokio::test]
    async fn destroy_removes_the_row_when_terminated() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "pwn", ChallengeType::DynamicContainer)
            .await;
        app.create_instance(player.participation.id, chal.id).await;
        let mut events = app.events.subscribe();

        let row = app
            .containers
            .create_container(player.participation.id, chal.id, player.user_id)
            .await
            .unwrap();
        app.containers
            .destroy_for_instance(player.participation.id, chal.id)
            .await
            .unwrap();

        assert_eq!(app.driver.destroyed(), vec![row.runtime_id]);
        assert!(containers_of(&app, player.participation.id).await.is_empty());

        let running = events.recv().await.unwrap();
        let destroyed = events.recv().await.unwrap();
        assert_eq!(running.channel, format!("game:{}", game.id));
        assert_eq!(running.event.payload["status"], "Running");
        assert_eq!(destroyed.event.payload["status"], "Destroyed");
    }

    #[tokio::test]
    async fn lingering_container_keeps_its_row() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "pwn", ChallengeType::DynamicContainer)
            .await;
        app.create_instance(player.participation.id, chal.id).await;

        app.containers
            .create_container(player.participation.id, chal.id, player.user_id)
            .await
            .unwrap();
        app.driver.linger.store(true, Ordering::SeqCst);

        let err = app
            .containers
            .destroy_for_instance(player.participation.id, chal.id)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Failed);
        assert_eq!(containers_of(&app, player.participation.id).await.len(), 1);
    }

    #[tokio::test]
    async fn reaper_destroys_only_expired_containers() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let expired = app
            .create_challenge(game.id, "pwn-1", ChallengeType::DynamicContainer)
            .await;
        let fresh = app
            .create_challenge(game.id, "pwn-2", ChallengeType::DynamicContainer)
            .await;
        app.create_instance(player.participation.id, expired.id).await;
        app.create_instance(player.participation.id, fresh.id).await;

        let old = app
            .containers
            .create_container(player.participation.id, expired.id, player.user_id)
            .await
            .unwrap();
        let kept = app
            .containers
            .create_container(player.participation.id, fresh.id, player.user_id)
            .await
            .unwrap();

        let mut active: container::ActiveModel = old.clone().into();
        active.expect_stop_at = Set(Utc::now() - Duration::minutes(1));
        active.update(&app.db).await.unwrap();

        let reaped = app.containers.reap_expired().await.unwrap();

        assert_eq!(reaped, 1);
        assert_eq!(app.driver.destroyed(), vec![old.runtime_id]);
        let rows = containers_of(&app, player.participation.id).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, kept.id);
    }
}

mod prolong {
    use super::*;

    #[tokio::test]
    async fn extension_outside_the_renewal_window_is_denied() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "pwn", ChallengeType::DynamicContainer)
            .await;
        app.create_instance(player.participation.id, chal.id).await;

        app.containers
            .create_container(player.participation.id, chal.id, player.user_id)
            .await
            .unwrap();

        let err = app
            .containers
            .prolong_for_instance(player.participation.id, chal.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Denied);
    }

    #[tokio::test]
    async fn extension_near_expiry_pushes_back_the_stop_time() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "pwn", ChallengeType::DynamicContainer)
            .await;
        app.create_instance(player.participation.id, chal.id).await;

        let row = app
            .containers
            .create_container(player.participation.id, chal.id, player.user_id)
            .await
            .unwrap();
        let near = Utc::now() + Duration::minutes(5);
        let mut active: container::ActiveModel = row.into();
        active.expect_stop_at = Set(near);
        active.update(&app.db).await.unwrap();

        let prolonged = app
            .containers
            .prolong_for_instance(player.participation.id, chal.id)
            .await
            .unwrap();

        let expected = near + app.containers.settings().extension;
        assert!((prolonged.expect_stop_at - expected).num_seconds().abs() <= 1);
    }
}

mod http {
    use super::*;

    #[tokio::test]
    async fn create_extend_and_destroy_through_the_api() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "pwn", ChallengeType::DynamicContainer)
            .await;
        app.create_instance(player.participation.id, chal.id).await;

        let created = app
            .post_with_token(
                &routes::container(game.id, chal.id),
                &serde_json::json!({}),
                &player.token,
            )
            .await;
        assert_eq!(created.status, 201, "{}", created.text);
        assert_eq!(created.body["host"], "127.0.0.1");
        assert_eq!(created.body["status"], "Running");

        let view = app
            .get_with_token(&routes::challenge(game.id, chal.id), &player.token)
            .await;
        assert_eq!(view.status, 200);
        assert_eq!(view.body["container"]["id"], created.body["id"]);

        let extend = app
            .post_with_token(
                &routes::container_extend(game.id, chal.id),
                &serde_json::json!({}),
                &player.token,
            )
            .await;
        assert_eq!(extend.status, 400);
        assert_eq!(extend.body["code"], "OPERATION_DENIED");

        let destroyed = app
            .delete_with_token(&routes::container(game.id, chal.id), &player.token)
            .await;
        assert_eq!(destroyed.status, 204);

        let again = app
            .delete_with_token(&routes::container(game.id, chal.id), &player.token)
            .await;
        assert_eq!(again.status, 404);
    }

    #[tokio::test]
    async fn ended_game_refuses_new_containers() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        app.update_game(&game, |g| g.end_time = Set(Utc::now() - Duration::minutes(1)))
            .await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "pwn", ChallengeType::DynamicContainer)
            .await;
        app.create_instance(player.participation.id, chal.id).await;

        let res = app
            .post_with_token(
                &routes::container(game.id, chal.id),
                &serde_json::json!({}),
                &player.token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert!(app.driver.created().is_empty());
    }
}
