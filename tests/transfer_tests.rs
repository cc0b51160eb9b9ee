#[cfg(test)]
mod transfer_tests {
    use std::{
        fs,
        path::{Path, PathBuf},
    };

    use sha2::{Digest, Sha256};
    use tempfile::TempDir;
    use test_case::test_case;

    use chromagap::{
        common::wire::{parse_header, HEADER_LEN},
        transfer::{
            compress::{compress, decompress},
            CancelToken, ChunkIndex, DirSink, FileStatus, FixedPolicy, MemorySink, Receiver,
            SendReport, Sender,
        },
        GapError, TransferConfig,
    };

    fn policy() -> FixedPolicy {
        FixedPolicy { workers: 2, buffer: 8192 }
    }

    fn pseudo_random(len: usize, seed: u32) -> Vec<u8> {
        let mut x = seed.max(1);
        (0..len)
            .map(|_| {
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                x as u8
            })
            .collect()
    }

    fn digest(path: &Path) -> Vec<u8> {
        Sha256::digest(fs::read(path).unwrap()).to_vec()
    }

    fn send(
        files: &[PathBuf],
        cfg: TransferConfig,
        key: Option<&str>,
    ) -> (SendReport, Vec<(String, Vec<u8>)>) {
        let mut sender = Sender::new(cfg).with_policy(policy());
        if let Some(k) = key {
            sender = sender.with_key(k);
        }
        let mut sink = MemorySink::new();
        let report = sender.send(files, &mut sink).unwrap();
        (report, sink.into_blobs())
    }

    fn receiver(key: Option<&str>) -> Receiver {
        let receiver = Receiver::new(TransferConfig::default()).with_policy(policy());
        match key {
            Some(k) => receiver.with_key(k),
            None => receiver,
        }
    }

    #[test_case(None; "plain")]
    #[test_case(Some("k1"); "keyed")]
    fn test_single_file_round_trip(key: Option<&str>) {
        let src = TempDir::new().unwrap();
        let path = src.path().join("payload.bin");
        fs::write(&path, pseudo_random(10_000, 7)).unwrap();

        let cfg = TransferConfig::default().with_chunk_size(2895);
        let (report, blobs) = send(&[path.clone()], cfg, key);
        assert_eq!(blobs.len() as u32, report.total_chunks);

        let out = TempDir::new().unwrap();
        let index = ChunkIndex::from_blobs(blobs);
        let received = receiver(key).reassemble(&index, out.path()).unwrap();

        assert!(received.all_verified());
        assert_eq!(digest(&out.path().join("payload.bin")), digest(&path));
        assert_eq!(received.file("payload.bin").unwrap().bytes_written, 10_000);
    }

    #[test]
    fn test_nested_directories_through_dir_sink() {
        let src = TempDir::new().unwrap();
        let docs = src.path().join("docs");
        let logs = src.path().join("logs/app");
        fs::create_dir_all(&docs).unwrap();
        fs::create_dir_all(&logs).unwrap();
        let a = docs.join("notes.txt");
        let b = logs.join("run.log");
        fs::write(&a, "meeting notes\n".repeat(500)).unwrap();
        fs::write(&b, pseudo_random(30_000, 99)).unwrap();

        let chunks = TempDir::new().unwrap();
        let mut sink = DirSink::new(chunks.path()).unwrap();
        let report = Sender::new(TransferConfig::default())
            .with_policy(policy())
            .with_key("shared secret")
            .send(&[&a, &b], &mut sink)
            .unwrap();
        let written = fs::read_dir(chunks.path()).unwrap().count();
        assert_eq!(written as u32, report.total_chunks);

        let out = TempDir::new().unwrap();
        let index = ChunkIndex::scan_dir(chunks.path()).unwrap();
        let received = receiver(Some("shared secret")).reassemble(&index, out.path()).unwrap();

        assert_eq!(received.verified(), 2);
        assert_eq!(digest(&out.path().join("docs/notes.txt")), digest(&a));
        assert_eq!(digest(&out.path().join("logs/app/run.log")), digest(&b));
    }

    #[test]
    fn test_blob_order_does_not_matter() {
        let src = TempDir::new().unwrap();
        let path = src.path().join("shuffled.dat");
        fs::write(&path, pseudo_random(40_000, 3)).unwrap();

        let cfg = TransferConfig::default().with_chunk_size(1500);
        let (report, mut blobs) = send(&[path.clone()], cfg, Some("k1"));
        assert!(report.data_chunks > 3);
        blobs.reverse();

        let out = TempDir::new().unwrap();
        let received =
            receiver(Some("k1")).reassemble(&ChunkIndex::from_blobs(blobs), out.path()).unwrap();
        assert!(received.all_verified());
        assert_eq!(digest(&out.path().join("shuffled.dat")), digest(&path));
    }

    #[test]
    fn test_chunks_only_decompress_in_order() {
        let raw = "a line that repeats with a counter\n".repeat(400) + &"x".repeat(50);
        let stream = compress(raw.as_bytes(), 9).unwrap();
        let pieces: Vec<&[u8]> = stream.chunks(stream.len().div_ceil(3)).collect();
        assert!(pieces.len() >= 2);

        assert_eq!(decompress(&pieces.concat()).unwrap(), raw.as_bytes());
        let reversed: Vec<u8> = pieces.iter().rev().flat_map(|p| p.iter().copied()).collect();
        assert!(decompress(&reversed).map_or(true, |out| out != raw.as_bytes()));
    }

    #[test]
    fn test_zero_byte_file() {
        let src = TempDir::new().unwrap();
        let empty = src.path().join("empty");
        let other = src.path().join("other.txt");
        fs::write(&empty, b"").unwrap();
        fs::write(&other, b"not empty").unwrap();

        let (_, blobs) = send(&[empty, other], TransferConfig::default(), None);
        let out = TempDir::new().unwrap();
        let index = ChunkIndex::from_blobs(blobs);
        let received = receiver(None).reassemble(&index, out.path()).unwrap();

        assert!(received.all_verified());
        assert_eq!(fs::read(out.path().join("empty")).unwrap(), b"");
        assert_eq!(fs::read(out.path().join("other.txt")).unwrap(), b"not empty");
    }

    #[test_case(Some("k2"); "wrong key")]
    #[test_case(None; "missing key")]
    fn test_wrong_key_writes_nothing(key: Option<&str>) {
        let src = TempDir::new().unwrap();
        let path = src.path().join("secret.txt");
        fs::write(&path, "top secret\n".repeat(200)).unwrap();
        let (_, blobs) = send(&[path], TransferConfig::default(), Some("k1"));

        let out = TempDir::new().unwrap();
        let res = receiver(key).reassemble(&ChunkIndex::from_blobs(blobs), out.path());
        assert!(matches!(res, Err(GapError::InvalidKey(_))));
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_key_on_plain_batch() {
        let src = TempDir::new().unwrap();
        let path = src.path().join("plain.txt");
        fs::write(&path, "nothing to hide").unwrap();
        let (_, blobs) = send(&[path], TransferConfig::default(), None);

        let out = TempDir::new().unwrap();
        let res = receiver(Some("k1")).reassemble(&ChunkIndex::from_blobs(blobs), out.path());
        assert!(matches!(res, Err(GapError::InvalidKey(_))));
    }

    #[test]
    fn test_missing_chunk_only_fails_its_file() {
        let src = TempDir::new().unwrap();
        let a = src.path().join("a.dat");
        let b = src.path().join("b.dat");
        fs::write(&a, pseudo_random(8_000, 11)).unwrap();
        fs::write(&b, pseudo_random(8_000, 12)).unwrap();

        let cfg = TransferConfig::default().with_chunk_size(1000);
        let (report, mut blobs) = send(&[a.clone(), b], cfg, Some("k1"));
        let lost = report.manifest.files[1].start_sequence + 1;
        blobs.retain(|(_, blob)| parse_header(blob).unwrap().seq != lost);

        let out = TempDir::new().unwrap();
        let received =
            receiver(Some("k1")).reassemble(&ChunkIndex::from_blobs(blobs), out.path()).unwrap();

        assert_eq!(received.file("a.dat").unwrap().status, FileStatus::Verified);
        let failed = received.file("b.dat").unwrap();
        assert_eq!(failed.status, FileStatus::Incomplete);
        assert!(matches!(failed.error, Some(GapError::IncompleteFile { .. })));
        assert_eq!(digest(&out.path().join("a.dat")), digest(&a));
        assert!(!out.path().join("b.dat").exists());
    }

    #[test]
    fn test_corrupt_chunk_only_fails_its_file() {
        let src = TempDir::new().unwrap();
        let a = src.path().join("a.dat");
        let b = src.path().join("b.dat");
        fs::write(&a, pseudo_random(5_000, 21)).unwrap();
        fs::write(&b, pseudo_random(5_000, 22)).unwrap();

        let (report, mut blobs) = send(&[a, b.clone()], TransferConfig::default(), None);
        let target = report.manifest.files[0].start_sequence;
        for (_, blob) in blobs.iter_mut() {
            if parse_header(blob).unwrap().seq == target {
                blob[HEADER_LEN] ^= 0xff;
            }
        }

        let out = TempDir::new().unwrap();
        let index = ChunkIndex::from_blobs(blobs);
        let received = receiver(None).reassemble(&index, out.path()).unwrap();

        let failed = received.file("a.dat").unwrap();
        assert_eq!(failed.status, FileStatus::Failed);
        assert!(matches!(failed.error, Some(GapError::ChecksumMismatch { .. })));
        assert!(!out.path().join("a.dat").exists());
        assert_eq!(received.file("b.dat").unwrap().status, FileStatus::Verified);
        assert_eq!(digest(&out.path().join("b.dat")), digest(&b));
    }

    #[test]
    fn test_output_directory_policy() {
        let src = TempDir::new().unwrap();
        let path = src.path().join("again.txt");
        fs::write(&path, "second delivery").unwrap();
        let (_, blobs) = send(&[path], TransferConfig::default(), None);
        let index = ChunkIndex::from_blobs(blobs);

        let out = TempDir::new().unwrap();
        fs::write(out.path().join("again.txt"), "stale").unwrap();
        let res = receiver(None).reassemble(&index, out.path());
        assert!(matches!(res, Err(GapError::OutputNotEmpty(_))));

        let overwriting = Receiver::new(TransferConfig::default().with_overwrite(true));
        let received = overwriting.reassemble(&index, out.path()).unwrap();
        assert!(received.all_verified());
        assert_eq!(fs::read_to_string(out.path().join("again.txt")).unwrap(), "second delivery");
    }

    #[test]
    fn test_missing_input_fails_before_emitting() {
        let src = TempDir::new().unwrap();
        let real = src.path().join("real.txt");
        fs::write(&real, "here").unwrap();

        let mut sink = MemorySink::new();
        let res = Sender::new(TransferConfig::default())
            .send(&[real, src.path().join("ghost.txt")], &mut sink);
        assert!(matches!(res, Err(GapError::FileNotFound(_))));
        assert!(sink.blobs().is_empty());
    }

    #[test]
    fn test_oversized_file_skipped_rest_delivered() {
        let src = TempDir::new().unwrap();
        let ok = src.path().join("ok.txt");
        let big = src.path().join("big.bin");
        fs::write(&ok, "small enough\n".repeat(40)).unwrap();
        fs::write(&big, pseudo_random(4096, 5)).unwrap();

        let cfg = TransferConfig::default().with_max_file_size(1024);
        let (report, blobs) = send(&[ok.clone(), big.clone()], cfg, Some("k1"));
        assert_eq!(report.manifest.files.len(), 1);
        assert!(matches!(
            report.skipped.as_slice(),
            [(p, GapError::FileTooLarge { size: 4096, limit: 1024, .. })] if p == &big
        ));

        let out = TempDir::new().unwrap();
        let index = ChunkIndex::from_blobs(blobs);
        let received = receiver(Some("k1")).reassemble(&index, out.path()).unwrap();

        assert_eq!(received.files.len(), 1);
        assert_eq!(received.file("ok.txt").unwrap().status, FileStatus::Verified);
        assert_eq!(digest(&out.path().join("ok.txt")), digest(&ok));
        assert!(!out.path().join("big.bin").exists());
    }

    #[test]
    fn test_cancelled_receive_marks_files() {
        let src = TempDir::new().unwrap();
        let a = src.path().join("a.txt");
        let b = src.path().join("b.txt");
        fs::write(&a, "first").unwrap();
        fs::write(&b, "second").unwrap();
        let (_, blobs) = send(&[a, b], TransferConfig::default(), None);

        let cancel = CancelToken::new();
        cancel.cancel();
        let out = TempDir::new().unwrap();
        let received = receiver(None)
            .with_cancel(cancel)
            .reassemble(&ChunkIndex::from_blobs(blobs), out.path())
            .unwrap();

        assert_eq!(received.files.len(), 2);
        for file in &received.files {
            assert_eq!(file.status, FileStatus::Cancelled);
            assert!(matches!(file.error, Some(GapError::Cancelled)));
        }
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_middle_manifest_chunk() {
        let src = TempDir::new().unwrap();
        let files: Vec<PathBuf> = (0..6)
            .map(|i| {
                let path = src.path().join(format!("part_{i}.dat"));
                fs::write(&path, pseudo_random(300, i + 40)).unwrap();
                path
            })
            .collect();

        let cfg = TransferConfig::default().with_chunk_size(64);
        let (report, mut blobs) = send(&files, cfg, None);
        assert!(report.manifest_chunks >= 3);
        blobs.retain(|(_, blob)| parse_header(blob).unwrap().seq != 1);

        let out = TempDir::new().unwrap();
        let res = receiver(None).reassemble(&ChunkIndex::from_blobs(blobs), out.path());
        assert!(matches!(res, Err(GapError::ManifestCorrupt(_))));
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }
}
