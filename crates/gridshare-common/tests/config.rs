use gridshare_common::{Config, ConfigError, FileStore};

#[tokio::test]
async fn test_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("nested").join("gridshare.json"));

    let config = Config {
        store_url: "http://127.0.0.1:8080/api".into(),
        autosave_secs: 5,
        ..Config::default()
    };
    config.save(&store).await.unwrap();

    let loaded = Config::load(&store).await.unwrap();
    assert_eq!(loaded, config);
}

#[tokio::test]
async fn test_unsupported_extension() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("gridshare.toml"));

    let err = Config::default().save(&store).await.unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "toml"));
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("absent.json"));

    assert!(matches!(
        Config::load(&store).await,
        Err(ConfigError::Io(_))
    ));
}
