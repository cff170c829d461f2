use beans_lib::{Bean, BeanStore, BeansError, Config};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> Arc<BeanStore> {
    Arc::new(BeanStore::init(dir.path().join(".beans"), Config::default()).unwrap())
}

#[test]
fn test_parallel_creates_and_reads() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let writers: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..10 {
                    store.create(Bean::new(format!("Thread {t} bean {i}"))).unwrap();
                }
            })
        })
        .collect();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..50 {
                    let beans = store.all().unwrap();
                    for bean in &beans {
                        // Every indexed bean is already on disk.
                        assert!(store.root().join(&bean.path).is_file());
                    }
                }
            })
        })
        .collect();
    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    assert_eq!(store.len().unwrap(), 80);
    let reopened = BeanStore::open(store.root(), Config::default()).unwrap();
    assert_eq!(reopened.all().unwrap(), store.all().unwrap());
}

#[test]
fn test_racing_etag_updates_have_one_winner() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let bean = store.create(Bean::new("Contended")).unwrap();
    let etag = bean.etag().unwrap();

    let barrier = Arc::new(Barrier::new(6));
    let handles: Vec<_> = (0..6)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            let mut edit = bean.clone();
            let etag = etag.clone();
            thread::spawn(move || {
                edit.body = format!("writer {i}");
                barrier.wait();
                store.update(edit, Some(&etag))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, BeansError::ETagMismatch { .. })));
    assert_eq!(store.get(&bean.id).unwrap().body, winners[0].body);
}
