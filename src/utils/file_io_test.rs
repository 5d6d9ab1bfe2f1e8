use crate::utils::file_io::read_if_exists;
use crate::utils::file_io::remove_dir_if_exists;
use crate::utils::file_io::touch;
use crate::utils::file_io::write_atomically;

#[tokio::test]
async fn test_touch_is_idempotent() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("marker");

    touch(&path).await.unwrap();
    touch(&path).await.unwrap();

    assert!(path.exists());
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_write_atomically_replaces_content_and_leaves_no_temp_files() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("record");

    write_atomically(&path, b"first").await.unwrap();
    write_atomically(&path, b"second").await.unwrap();

    assert_eq!(read_if_exists(&path).await.unwrap(), Some(b"second".to_vec()));
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_read_if_exists_returns_none_for_missing_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    assert_eq!(read_if_exists(&temp_dir.path().join("missing")).await.unwrap(), None);
}

#[tokio::test]
async fn test_remove_dir_if_exists_tolerates_missing_dir() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path().join("a").join("b");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("f"), b"x").unwrap();

    remove_dir_if_exists(&temp_dir.path().join("a")).await.unwrap();
    assert!(!temp_dir.path().join("a").exists());

    remove_dir_if_exists(&temp_dir.path().join("a")).await.unwrap();
}
