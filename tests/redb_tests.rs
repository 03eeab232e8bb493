mod common;

#[cfg(test)]
mod tests {
    use crate::common::test_utils::TestDir;
    use bloom_blacklist::{
        BlacklistEngine, HashConfig, RedbStorage, Request, Response, RunMode,
        StorageBackend,
    };
    use std::fs;

    fn open_engine(dir: &TestDir, array_size: usize, repeats: Vec<u32>) -> (BlacklistEngine, RedbStorage) {
        fs::create_dir_all(dir.path()).unwrap();
        let storage = RedbStorage::open(dir.file("blacklist.redb"))
            .expect("Failed to open redb storage");
        let config = HashConfig::new(array_size, repeats).unwrap();
        let engine = BlacklistEngine::open(config, storage.clone())
            .expect("Failed to open engine");
        (engine, storage)
    }

    #[test]
    fn test_redb_persistence_and_recovery() {
        let dir = TestDir::new("redb_recovery");
        let bits_before = {
            let (engine, _storage) = open_engine(&dir, 128, vec![1, 2, 3]);
            assert_eq!(engine.run_mode(), RunMode::Fresh);
            engine.execute(&Request::add("www.example.com0")).unwrap();
            engine.execute(&Request::add("www.another.org")).unwrap();
            engine.bits().unwrap()
        };

        let (engine, storage) = open_engine(&dir, 128, vec![1, 2, 3]);
        assert_eq!(engine.run_mode(), RunMode::Continued);
        assert_eq!(engine.bits().unwrap(), bits_before);
        assert_eq!(
            storage.load_record().unwrap().as_deref(),
            Some("128 1 2 3")
        );
        assert_eq!(
            engine.execute(&Request::contain("www.another.org")).unwrap(),
            Response::Contains {
                filter_hit: true,
                exact_hit: true
            }
        );
    }

    #[test]
    fn test_redb_counts_repeated_adds_and_delete_clears() {
        let dir = TestDir::new("redb_counts");
        let (engine, storage) = open_engine(&dir, 64, vec![1, 2]);

        engine.execute(&Request::add("www.dup.com")).unwrap();
        engine.execute(&Request::add("www.dup.com")).unwrap();
        assert_eq!(storage.occurrences("www.dup.com").unwrap(), 2);

        assert_eq!(
            engine.execute(&Request::delete("www.dup.com")).unwrap(),
            Response::NoContent
        );
        assert_eq!(storage.occurrences("www.dup.com").unwrap(), 0);
    }

    #[test]
    fn test_redb_config_change_starts_fresh() {
        let dir = TestDir::new("redb_fresh");
        {
            let (engine, _storage) = open_engine(&dir, 64, vec![1, 2]);
            engine.execute(&Request::add("www.old.com")).unwrap();
        }

        let (engine, _storage) = open_engine(&dir, 64, vec![1]);
        assert_eq!(engine.run_mode(), RunMode::Fresh);
        assert!(engine.blacklisted().unwrap().is_empty());
        assert_eq!(engine.stats().unwrap().bits_set, 0);
    }
}
