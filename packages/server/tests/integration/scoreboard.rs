use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ::common::{AnswerStatus, ChallengeType};
use async_trait::async_trait;
use sea_orm::Set;
use server::cache::{CacheError, CacheStore, MemoryCache};
use server::engine::{
    FlagChecker, ScoreboardService, SubmitAnswer, generate_scoreboard, submit_answer,
};
use tokio_util::sync::CancellationToken;
use server::extractors::auth::GAME_MANAGE;

use crate::common::{Player, TestApp, routes};

async fn solve(app: &TestApp, player: &Player, game_id: i32, challenge_id: i32, answer: &str) {
    let row = submit_answer(
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
    .unwrap();
    app.checker.check(row.id).await.unwrap();
}

#[tokio::test]
async fn blood_bonuses_rank_teams_by_solve_order() {
    let app = TestApp::spawn().await;
    let game = app.create_game().await;
    let chal = app
        .create_challenge(game.id, "warmup", ChallengeType::StaticAttachment)
        .await;
    app.add_flag(chal.id, "flag{static}", None).await;

    let mut players = Vec::new();
    for name in ["first", "second", "third", "fourth"] {
        let player = app.create_player(game.id, name).await;
        app.create_instance(player.participation.id, chal.id).await;
        players.push(player);
    }
    for player in &players {
        solve(&app, player, game.id, chal.id, "flag{static}").await;
    }

    let board = app.scoreboard.get(game.id).await.unwrap();

    let scores: Vec<i64> = board.items.iter().map(|i| i.score).collect();
    assert_eq!(scores, vec![525, 515, 505, 500]);
    let names: Vec<&str> = board.items.iter().map(|i| i.team_name.as_str()).collect();
    assert_eq!(names, vec!["first", "second", "third", "fourth"]);
    let ranks: Vec<u32> = board.items.iter().map(|i| i.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4]);

    let summary = &board.challenges[0];
    assert_eq!(summary.solved_count, 4);
    assert_eq!(summary.bloods.len(), 3);
    assert_eq!(summary.bloods[0].participation_id, players[0].participation.id);
}

#[tokio::test]
async fn no_bonus_games_award_the_plain_score() {
    let app = TestApp::spawn().await;
    let game = app.create_game().await;
    app.update_game(&game, |g| g.no_bonus = Set(true)).await;
    let chal = app
        .create_challenge(game.id, "warmup", ChallengeType::StaticAttachment)
        .await;
    app.add_flag(chal.id, "flag{static}", None).await;
    let player = app.create_player(game.id, "alpha").await;
    app.create_instance(player.participation.id, chal.id).await;

    solve(&app, &player, game.id, chal.id, "flag{static}").await;
    let board = generate_scoreboard(&app.db, game.id).await.unwrap();

    assert!(board.no_bonus);
    assert_eq!(board.items[0].score, 500);
}

#[tokio::test]
async fn accepted_answer_invalidates_the_cached_board() {
    let app = TestApp::spawn().await;
    let game = app.create_game().await;
    let chal = app
        .create_challenge(game.id, "warmup", ChallengeType::StaticAttachment)
        .await;
    app.add_flag(chal.id, "flag{static}", None).await;
    let player = app.create_player(game.id, "alpha").await;
    app.create_instance(player.participation.id, chal.id).await;

    let before = app.scoreboard.get(game.id).await.unwrap();
    assert_eq!(before.items[0].score, 0);

    solve(&app, &player, game.id, chal.id, "flag{static}").await;

    let after = app.scoreboard.get(game.id).await.unwrap();
    assert_eq!(after.items[0].score, 525);
    assert_eq!(after.items[0].solved_count, 1);
}

/// Memory cache whose removals can be made to fail once.
#[derive(Default)]
struct FlakyCache {
    inner: MemoryCache,
    fail_next_remove: AtomicBool,
}

#[async_trait]
impl CacheStore for FlakyCache {
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.inner.get_raw(key).await
    }

    async fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.inner.set_raw(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        if self.fail_next_remove.swap(false, Ordering::SeqCst) {
            return Err(CacheError::Backend("connection reset".into()));
        }
        self.inner.remove(key).await
    }
}

#[tokio::test]
async fn retried_check_invalidates_after_a_cache_failure() {
    let app = TestApp::spawn().await;
    let game = app.create_game().await;
    let chal = app
        .create_challenge(game.id, "warmup", ChallengeType::StaticAttachment)
        .await;
    app.add_flag(chal.id, "flag{static}", None).await;
    let player = app.create_player(game.id, "alpha").await;
    app.create_instance(player.participation.id, chal.id).await;

    let cache = Arc::new(FlakyCache::default());
    let scoreboard = Arc::new(ScoreboardService::new(
        app.db.clone(),
        cache.clone(),
        Duration::from_secs(3600),
        Duration::from_secs(30),
        CancellationToken::new(),
    ));
    let checker = FlagChecker::new(app.db.clone(), scoreboard.clone(), app.events.clone());

    let before = scoreboard.get(game.id).await.unwrap();
    assert_eq!(before.items[0].score, 0);

    let row = submit_answer(
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
    .unwrap();

    cache.fail_next_remove.store(true, Ordering::SeqCst);
    assert!(checker.check(row.id).await.is_err());

    let retry = checker.check(row.id).await.unwrap();
    assert!(retry.already_checked);
    assert_eq!(retry.status, AnswerStatus::Accepted);

    let after = scoreboard.get(game.id).await.unwrap();
    assert_eq!(after.items[0].score, 525);
}

#[tokio::test]
async fn invalidation_from_another_replica_drops_a_board_built_across_it() {
    let app = TestApp::spawn().await;
    let game = app.create_game().await;
    let chal = app
        .create_challenge(game.id, "warmup", ChallengeType::StaticAttachment)
        .await;
    app.add_flag(chal.id, "flag{static}", None).await;
    let player = app.create_player(game.id, "alpha").await;
    app.create_instance(player.participation.id, chal.id).await;

    let shared = Arc::new(ReplicaRaceCache::default());
    let other_view: Arc<dyn CacheStore> = Arc::new(SharedView(shared.clone()));
    let local_view: Arc<dyn CacheStore> = shared.clone();
    let other = Arc::new(replica(&app, other_view));
    *shared.on_board_store.lock().unwrap() = Some((other, game.id));
    let local = replica(&app, local_view);

    local.get(game.id).await.unwrap();

    let cached = shared
        .inner
        .get_raw(&server::engine::scoreboard::cache_key(game.id))
        .await
        .unwrap();
    assert!(cached.is_none());
}

fn replica(app: &TestApp, cache: Arc<dyn CacheStore>) -> ScoreboardService {
    ScoreboardService::new(
        app.db.clone(),
        cache,
        Duration::from_secs(3600),
        Duration::from_secs(30),
        CancellationToken::new(),
    )
}

/// Cache that lets another replica invalidate right before a board is stored.
#[derive(Default)]
struct ReplicaRaceCache {
    inner: MemoryCache,
    on_board_store: std::sync::Mutex<Option<(Arc<ScoreboardService>, i32)>>,
}

impl ReplicaRaceCache {
    fn take_hook(&self, key: &str) -> Option<(Arc<ScoreboardService>, i32)> {
        if !key.starts_with("_ScoreBoard_") {
            return None;
        }
        self.on_board_store.lock().unwrap().take()
    }
}

#[async_trait]
impl CacheStore for ReplicaRaceCache {
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.inner.get_raw(key).await
    }

    async fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        if let Some((other, game_id)) = self.take_hook(key) {
            other.invalidate(game_id).await.unwrap();
        }
        self.inner.set_raw(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.inner.remove(key).await
    }
}

/// The other replica's handle on the same backing store, without the hook.
struct SharedView(Arc<ReplicaRaceCache>);

#[async_trait]
impl CacheStore for SharedView {
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.0.inner.get_raw(key).await
    }

    async fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.0.inner.set_raw(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.0.inner.remove(key).await
    }
}

#[tokio::test]
async fn wrong_answers_keep_the_cached_board() {
    let app = TestApp::spawn().await;
    let game = app.create_game().await;
    let chal = app
        .create_challenge(game.id, "warmup", ChallengeType::StaticAttachment)
        .await;
    app.add_flag(chal.id, "flag{static}", None).await;
    let player = app.create_player(game.id, "alpha").await;
    app.create_instance(player.participation.id, chal.id).await;

    let before = app.scoreboard.get(game.id).await.unwrap();
    solve(&app, &player, game.id, chal.id, "flag{wrong}").await;
    let after = app.scoreboard.get(game.id).await.unwrap();

    assert_eq!(before.updated_at, after.updated_at);
}

#[tokio::test]
async fn organization_ranks_are_computed_per_organization() {
    let app = TestApp::spawn().await;
    let game = app.create_game().await;
    app.update_game(&game, |g| {
        g.organizations = Set(Some(serde_json::json!(["uni", "corp"])))
    })
    .await;
    let chal = app
        .create_challenge(game.id, "warmup", ChallengeType::StaticAttachment)
        .await;
    app.add_flag(chal.id, "flag{static}", None).await;

    let corp = app.create_player_in(game.id, "corp-team", Some("corp")).await;
    let uni_a = app.create_player_in(game.id, "uni-a", Some("uni")).await;
    let uni_b = app.create_player_in(game.id, "uni-b", Some("uni")).await;
    for player in [&corp, &uni_a, &uni_b] {
        app.create_instance(player.participation.id, chal.id).await;
    }
    solve(&app, &corp, game.id, chal.id, "flag{static}").await;
    solve(&app, &uni_b, game.id, chal.id, "flag{static}").await;

    let board = generate_scoreboard(&app.db, game.id).await.unwrap();
    let item = |pid: i32| board.items.iter().find(|i| i.participation_id == pid).unwrap();

    assert_eq!(item(corp.participation.id).rank, 1);
    assert_eq!(item(corp.participation.id).organization_rank, Some(1));
    assert_eq!(item(uni_b.participation.id).organization_rank, Some(1));
    assert_eq!(item(uni_a.participation.id).organization_rank, Some(2));

    let orgs: Vec<Option<&str>> = board
        .timelines
        .iter()
        .map(|t| t.organization.as_deref())
        .collect();
    assert_eq!(orgs, vec![None, Some("uni"), Some("corp")]);
}

mod http {
    use super::*;

    #[tokio::test]
    async fn scoreboard_is_public() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        app.create_player(game.id, "alpha").await;

        let res = app.get_without_token(&routes::scoreboard(game.id)).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["game_id"], game.id);
        assert_eq!(res.body["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_game_returns_404() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(&routes::scoreboard(4242)).await;

        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn flush_requires_game_manage() {
        let app = TestApp::spawn().await;
        let game = app.create_game().await;
        let player = app.create_player(game.id, "alpha").await;

        let denied = app
            .post_with_token(
                &routes::scoreboard_flush(game.id),
                &serde_json::json!({}),
                &player.token,
            )
            .await;
        assert_eq!(denied.status, 403);

        let admin = app.token(1000, &[GAME_MANAGE]);
        let res = app
            .post_with_token(
                &routes::scoreboard_flush(game.id),
                &serde_json::json!({}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 204);
    }
}
