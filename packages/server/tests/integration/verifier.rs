use ::common::{AnswerStatus, BloodRank, ChallengeType};
use chrono::{Duration, Utc};
use sea_orm::{EntityTrait, Set};
use server::engine::{SubmitAnswer, get_instance, submit_answer, verify_answer};
use server::entity::{challenge, game_instance};

use crate::common::{Player, TestApp};

async fn store_answer(
    app: &TestApp,
    player: &Player,
    game_id: i32,
    challenge_id: i32,
    answer: &str,
) -> i32 {
    submit_answer(
        &app.db,
        SubmitAnswer {
            game_id,
            challenge_id,
            participation_id: player.participation.id,
            user_id: player.user_id,
            answer: answer.into(),
        },
    )
    .await
    .unwrap()
    .id
}

async fn accepted_count(app: &TestApp, challenge_id: i32) -> i32 {
    challenge::Entity::find_by_id(challenge_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap()
        .accepted_count
}

mod static_flags {
    use super::*;

    #[tokio::test]
    async fn correct_answer_is_accepted_as_first_blood() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "warmup", ChallengeType::StaticAttachment)
            .await;
        app.add_flag(chal.id, "flag{static}", None).await;
        let instance = app.create_instance(player.participation.id, chal.id).await;

        let id = store_answer(&app, &player, game.id, chal.id, "  flag{static} ").await;
        let verdict = verify_answer(&app.db, id).await.unwrap();

        assert_eq!(verdict.status, AnswerStatus::Accepted);
        assert_eq!(verdict.rank, BloodRank::FirstBlood);
        assert!(!verdict.already_checked);
        assert_eq!(accepted_count(&app, chal.id).await, 1);

        let instance = game_instance::Entity::find_by_id(instance.id)
            .one(&app.db)
            .await
            .unwrap()
            .unwrap();
        assert!(instance.is_solved);
    }

    #[tokio::test]
    async fn wrong_answer_changes_nothing() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "warmup", ChallengeType::StaticAttachment)
            .await;
        app.add_flag(chal.id, "flag{static}", None).await;
        app.create_instance(player.participation.id, chal.id).await;

        let id = store_answer(&app, &player, game.id, chal.id, "flag{nope}").await;
        let verdict = verify_answer(&app.db, id).await.unwrap();

        assert_eq!(verdict.status, AnswerStatus::WrongAnswer);
        assert_eq!(verdict.rank, BloodRank::Unaccepted);
        assert_eq!(accepted_count(&app, chal.id).await, 0);
    }

    #[tokio::test]
    async fn verification_happens_at_most_once() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "warmup", ChallengeType::StaticAttachment)
            .await;
        app.add_flag(chal.id, "flag{static}", None).await;
        app.create_instance(player.participation.id, chal.id).await;

        let id = store_answer(&app, &player, game.id, chal.id, "flag{static}").await;
        verify_answer(&app.db, id).await.unwrap();
        let again = verify_answer(&app.db, id).await.unwrap();

        assert!(again.already_checked);
        assert_eq!(again.status, AnswerStatus::Accepted);
        assert_eq!(accepted_count(&app, chal.id).await, 1);
    }

    #[tokio::test]
    async fn second_solve_by_the_same_team_is_not_counted() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "warmup", ChallengeType::StaticAttachment)
            .await;
        app.add_flag(chal.id, "flag{static}", None).await;
        app.create_instance(player.participation.id, chal.id).await;

        let first = store_answer(&app, &player, game.id, chal.id, "flag{static}").await;
        let second = store_answer(&app, &player, game.id, chal.id, "flag{static}").await;
        verify_answer(&app.db, first).await.unwrap();
        let verdict = verify_answer(&app.db, second).await.unwrap();

        assert_eq!(verdict.status, AnswerStatus::Accepted);
        assert_eq!(verdict.rank, BloodRank::Normal);
        assert_eq!(accepted_count(&app, chal.id).await, 1);
    }

    #[tokio::test]
    async fn answer_without_instance_is_not_found() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "warmup", ChallengeType::StaticAttachment)
            .await;
        app.add_flag(chal.id, "flag{static}", None).await;

        let id = store_answer(&app, &player, game.id, chal.id, "flag{static}").await;
        let verdict = verify_answer(&app.db, id).await.unwrap();

        assert_eq!(verdict.status, AnswerStatus::NotFound);
        assert_eq!(accepted_count(&app, chal.id).await, 0);
    }
}

mod dynamic_flags {
    use super::*;

    #[tokio::test]
    async fn only_the_dispatched_flag_is_accepted() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let alpha = app.create_player(game.id, "alpha").await;
        let beta = app.create_player(game.id, "beta").await;
        let chal = app
            .create_challenge(game.id, "pwn", ChallengeType::DynamicContainer)
            .await;
        app.create_instance(alpha.participation.id, chal.id).await;
        app.create_instance(beta.participation.id, chal.id).await;

        let a_flag = get_instance(&app.db, alpha.participation.id, chal.id)
            .await
            .unwrap()
            .flag
            .unwrap()
            .flag;
        get_instance(&app.db, beta.participation.id, chal.id)
            .await
            .unwrap();

        let own = store_answer(&app, &alpha, game.id, chal.id, &a_flag).await;
        let foreign = store_answer(&app, &beta, game.id, chal.id, &a_flag).await;

        assert_eq!(
            verify_answer(&app.db, own).await.unwrap().status,
            AnswerStatus::Accepted
        );
        assert_eq!(
            verify_answer(&app.db, foreign).await.unwrap().status,
            AnswerStatus::WrongAnswer
        );
    }

    #[tokio::test]
    async fn concurrent_first_solves_get_unique_bloods() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let chal = app
            .create_challenge(game.id, "pwn", ChallengeType::DynamicContainer)
            .await;

        let mut submissions = Vec::new();
        for name in ["a", "b", "c", "d", "e"] {
            let player = app.create_player(game.id, name).await;
            app.create_instance(player.participation.id, chal.id).await;
            let flag = get_instance(&app.db, player.participation.id, chal.id)
                .await
                .unwrap()
                .flag
                .unwrap()
                .flag;
            submissions.push(store_answer(&app, &player, game.id, chal.id, &flag).await);
        }

        let handles: Vec<_> = submissions
            .into_iter()
            .map(|id| {
                let db = app.db.clone();
                tokio::spawn(async move { verify_answer(&db, id).await })
            })
            .collect();

        let mut ranks = Vec::new();
        for handle in handles {
            let verdict = handle.await.unwrap().unwrap();
            assert_eq!(verdict.status, AnswerStatus::Accepted);
            ranks.push(verdict.rank);
        }

        let count = |r: BloodRank| ranks.iter().filter(|&&x| x == r).count();
        assert_eq!(count(BloodRank::FirstBlood), 1);
        assert_eq!(count(BloodRank::SecondBlood), 1);
        assert_eq!(count(BloodRank::ThirdBlood), 1);
        assert_eq!(count(BloodRank::Normal), 2);
        assert_eq!(accepted_count(&app, chal.id).await, 5);
    }
}

mod game_window {
    use super::*;

    #[tokio::test]
    async fn practice_solves_after_end_are_accepted_without_counting() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        app.update_game(&game, |g| {
            g.end_time = Set(Utc::now() - Duration::minutes(1));
            g.practice_mode = Set(true);
        })
        .await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "warmup", ChallengeType::StaticAttachment)
            .await;
        app.add_flag(chal.id, "flag{static}", None).await;
        app.create_instance(player.participation.id, chal.id).await;

        let id = store_answer(&app, &player, game.id, chal.id, "flag{static}").await;
        let verdict = verify_answer(&app.db, id).await.unwrap();

        assert_eq!(verdict.status, AnswerStatus::Accepted);
        assert_eq!(verdict.rank, BloodRank::Normal);
        assert_eq!(accepted_count(&app, chal.id).await, 0);
    }

    #[tokio::test]
    async fn submissions_after_end_are_refused_outside_practice() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        app.update_game(&game, |g| g.end_time = Set(Utc::now() - Duration::minutes(1)))
            .await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "warmup", ChallengeType::StaticAttachment)
            .await;

        let err = submit_answer(
            &app.db,
            SubmitAnswer {
                game_id: game.id,
                challenge_id: chal.id,
                participation_id: player.participation.id,
                user_id: player.user_id,
                answer: "flag{static}".into(),
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), server::engine::ErrorKind::Denied);
    }
}

mod checker {
    use super::*;

    #[tokio::test]
    async fn blood_is_announced_on_the_game_channel() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;
        let chal = app
            .create_challenge(game.id, "warmup", ChallengeType::StaticAttachment)
            .await;
        app.add_flag(chal.id, "flag{static}", None).await;
        app.create_instance(player.participation.id, chal.id).await;
        let mut events = app.events.subscribe();

        let id = store_answer(&app, &player, game.id, chal.id, "flag{static}").await;
        let verdict = app.checker.check(id).await.unwrap();

        assert_eq!(verdict.rank, BloodRank::FirstBlood);
        let event = events.recv().await.unwrap();
        assert_eq!(event.channel, format!("game:{}", game.id));
        assert_eq!(event.event.topic, "new_blood");
        assert_eq!(event.event.payload["participation_id"], player.participation.id);
    }
}
