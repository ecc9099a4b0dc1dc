use serde_json::json;
use streakbot_core::{
    ConfigError,
    Env,
    GuildConfig,
    GuildConfigStore,
    config::{Section, StreakSystem}
};
use tempfile::TempDir;


fn store() -> (TempDir, GuildConfigStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = GuildConfigStore::new(dir.path().join("databases"));
    (dir, store)
}

#[tokio::test]
async fn missing_guild_is_none() {
    let (_dir, store) = store();

    assert!(store.get("123").await.unwrap().is_none());
    assert!(store.get_or_default("123").await.unwrap().is_none());
}

#[tokio::test]
async fn save_then_get_round_trips() {
    let (_dir, store) = store();

    let config: GuildConfig = serde_json::from_value(json!({
        "streakSystem": {"enabled": true, "streakThreshold": 5},
        "levelSystem": {"enabled": true, "rewards": {"10": "role-10"}},
        "prefix": "!"
    }))
    .unwrap();

    store.save("123", &config).await.unwrap();

    assert_eq!(store.get("123").await.unwrap(), Some(config));
}

#[tokio::test]
async fn file_is_pretty_printed_under_guild_dir() {
    let (dir, store) = store();

    let config = GuildConfig {
        streak_system: Some(StreakSystem::default().into()),
        ..Default::default()
    };

    store.save("42", &config).await.unwrap();

    let path = dir.path().join("databases").join("42").join("config.json");
    assert_eq!(store.path("42").unwrap(), path);

    let raw = std::fs::read_to_string(path).unwrap();
    assert_eq!(
        raw,
        "{\n  \"streakSystem\": {\n    \"enabled\": false,\n    \"streakThreshold\": 10\n  }\n}\n"
    );
}

#[tokio::test]
async fn save_replaces_whole_document() {
    let (_dir, store) = store();

    let full = GuildConfig::default().with_default_structure();
    store.save("7", &full).await.unwrap();

    let small = GuildConfig::default();
    store.save("7", &small).await.unwrap();

    assert_eq!(store.get("7").await.unwrap(), Some(small));
}

#[tokio::test]
async fn first_guild_scenario() {
    let (_dir, store) = store();

    assert!(store.get("123").await.unwrap().is_none());

    let config: GuildConfig = serde_json::from_value(json!({
        "streakSystem": {"enabled": true, "streakThreshold": 5}
    }))
    .unwrap();
    store.save("123", &config).await.unwrap();

    let loaded = store.get("123").await.unwrap().unwrap();
    assert_eq!(loaded, config);

    let filled = store.get_or_default("123").await.unwrap().unwrap();
    assert_eq!(
        serde_json::to_value(&filled).unwrap(),
        json!({
            "streakSystem": {"enabled": true, "streakThreshold": 5},
            "messageLeaderSystem": {"enabled": false},
            "levelSystem": {
                "enabled": false,
                "xpPerMessage": 10,
                "levelMultiplier": 1.5,
                "rewards": {}
            },
            "reportSettings": {
                "weeklyReportChannel": "",
                "monthlyReportChannel": ""
            }
        })
    );
}

#[tokio::test]
async fn malformed_file_is_format_error() {
    let (_dir, store) = store();

    let path = store.path("9").unwrap();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(store.get("9").await, Err(ConfigError::Format(_))));
}

#[tokio::test]
async fn non_object_document_is_format_error() {
    let (_dir, store) = store();

    let path = store.path("9").unwrap();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "[1, 2, 3]").unwrap();

    assert!(matches!(store.get("9").await, Err(ConfigError::Format(_))));
}

#[tokio::test]
async fn unexpected_section_shapes_still_load() {
    let (_dir, store) = store();

    let path = store.path("11").unwrap();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{"streakSystem": false, "levelSystem": {"xpPerMessage": 12.5}}"#
    )
    .unwrap();

    let config = store.get("11").await.unwrap().unwrap();
    assert_eq!(config.streak_system, Some(Section::Raw(json!(false))));
    assert_eq!(
        config.level_system,
        Some(Section::Raw(json!({"xpPerMessage": 12.5})))
    );

    let filled = store.get_or_default("11").await.unwrap().unwrap();
    assert_eq!(filled.streak_system, Some(StreakSystem::default().into()));
    assert_eq!(
        serde_json::to_value(&filled).unwrap()["levelSystem"],
        json!({"xpPerMessage": 12.5})
    );
}

#[tokio::test]
async fn null_fields_survive_a_save() {
    let (_dir, store) = store();

    let config: GuildConfig = serde_json::from_value(json!({
        "reportSettings": {"weeklyReportChannel": null}
    }))
    .unwrap();

    store.save("12", &config).await.unwrap();

    let raw = std::fs::read_to_string(store.path("12").unwrap()).unwrap();
    assert!(raw.contains("\"weeklyReportChannel\": null"));
    assert_eq!(store.get("12").await.unwrap(), Some(config));
}

#[tokio::test]
async fn unreadable_path_is_io_error() {
    let (_dir, store) = store();

    // ? a directory where the file should be
    std::fs::create_dir_all(store.path("5").unwrap()).unwrap();

    assert!(matches!(store.get("5").await, Err(ConfigError::Io(_))));
}

#[tokio::test]
async fn save_into_blocked_dir_is_io_error() {
    let (_dir, store) = store();

    std::fs::create_dir_all(store.base_dir()).unwrap();
    std::fs::write(store.base_dir().join("5"), "not a directory").unwrap();

    assert!(matches!(
        store.save("5", &GuildConfig::default()).await,
        Err(ConfigError::Io(_))
    ));
}

#[tokio::test]
async fn invalid_ids_never_touch_disk() {
    let (_dir, store) = store();

    assert!(matches!(
        store.save("../escape", &GuildConfig::default()).await,
        Err(ConfigError::InvalidGuildId(_))
    ));
    assert!(matches!(store.get("").await, Err(ConfigError::InvalidGuildId(_))));
    assert!(!store.base_dir().exists());
}

#[test]
fn store_from_env_uses_config_dir() {
    let env = Env::from_lookup(|key| {
        (key == "CONFIG_DIR").then(|| "/srv/guilds".to_string())
    });

    let store = GuildConfigStore::from_env(&env);

    assert_eq!(store.base_dir(), std::path::Path::new("/srv/guilds"));
}
