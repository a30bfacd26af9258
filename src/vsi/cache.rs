use std::io;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct BlockKey {
    key: Arc<str>,
    index: u64,
}

/// Block-aligned LRU cache shared by the files of one handler.
///
/// Blocks are `block_size` bytes except the last block of a file, which stops at
/// the file size.
pub(crate) struct BlockCache {
    block_size: u64,
    blocks: Mutex<LruCache<BlockKey, Arc<[u8]>>>,
}

impl BlockCache {
    /// `None` when `block_size` or `capacity_bytes` is 0, which disables caching.
    /// A capacity below one block still holds one block.
    pub(crate) fn new(block_size: usize, capacity_bytes: usize) -> Option<Self> {
        if block_size == 0 || capacity_bytes == 0 {
            return None;
        }
        let capacity = NonZeroUsize::new((capacity_bytes / block_size).max(1))?;
        Some(BlockCache {
            block_size: block_size as u64,
            blocks: Mutex::new(LruCache::new(capacity)),
        })
    }

    fn lookup(&self, key: &BlockKey) -> Option<Arc<[u8]>> {
        let mut blocks = match self.blocks.lock() {
            Ok(guard) => guard,
            Err(poison_error) => poison_error.into_inner(),
        };
        blocks.get(key).cloned()
    }

    fn insert(&self, key: BlockKey, block: Arc<[u8]>) {
        let mut blocks = match self.blocks.lock() {
            Ok(guard) => guard,
            Err(poison_error) => poison_error.into_inner(),
        };
        blocks.put(key, block);
    }

    /// Fill `buf` from `offset` of a `file_size` byte file, returning the number of
    /// bytes copied.
    ///
    /// Missing blocks are fetched with `fetch(offset, buf)`, one call per run of
    /// consecutive missing blocks. `fetch` fills as much of `buf` as it can and
    /// returns the number of bytes written.
    pub(crate) fn read<F>(
        &self,
        key: &Arc<str>,
        file_size: u64,
        offset: u64,
        buf: &mut [u8],
        mut fetch: F,
    ) -> io::Result<usize>
    where
        F: FnMut(u64, &mut [u8]) -> io::Result<usize>,
    {
        if offset >= file_size || buf.is_empty() {
            return Ok(0);
        }
        let end = file_size.min(offset + buf.len() as u64);
        let first = offset / self.block_size;
        let last = (end - 1) / self.block_size;

        let mut blocks: Vec<Option<Arc<[u8]>>> = (first..=last)
            .map(|index| {
                self.lookup(&BlockKey {
                    key: key.clone(),
                    index,
                })
            })
            .collect();

        let mut i = 0;
        while i < blocks.len() {
            if blocks[i].is_some() {
                i += 1;
                continue;
            }
            let run_start = i;
            while i < blocks.len() && blocks[i].is_none() {
                i += 1;
            }
            let run_offset = (first + run_start as u64) * self.block_size;
            let run_end = file_size.min((first + i as u64) * self.block_size);
            let mut run = vec![0_u8; (run_end - run_offset) as usize];
            let n = fetch(run_offset, &mut run)?;
            run.truncate(n);
            log::trace!(
                "fetched {n} bytes at {run_offset} of {key} for {} block(s)",
                i - run_start
            );

            for (j, chunk) in run.chunks(self.block_size as usize).enumerate() {
                let index = first + (run_start + j) as u64;
                let block: Arc<[u8]> = Arc::from(chunk);
                self.insert(
                    BlockKey {
                        key: key.clone(),
                        index,
                    },
                    block.clone(),
                );
                blocks[run_start + j] = Some(block);
            }
            if run.len() < (run_end - run_offset) as usize {
                // short fetch, the file ends earlier than its size said
                blocks.truncate(run_start + run.len().div_ceil(self.block_size as usize));
                break;
            }
        }

        let mut copied = 0;
        let mut position = offset;
        for (j, block) in blocks.iter().enumerate() {
            let Some(block) = block else { break };
            let block_start = (first + j as u64) * self.block_size;
            let from = (position - block_start) as usize;
            if from >= block.len() {
                break;
            }
            let take = (block.len() - from).min(buf.len() - copied);
            buf[copied..copied + take].copy_from_slice(&block[from..from + take]);
            copied += take;
            position += take as u64;
            if copied == buf.len() || block.len() < self.block_size as usize {
                break;
            }
        }
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Vec<u8> {
        (0..=255).collect()
    }

    /// Serves `data` and records the fetched ranges.
    fn fetcher<'a>(
        data: &'a [u8],
        calls: &'a mut Vec<(u64, usize)>,
    ) -> impl FnMut(u64, &mut [u8]) -> io::Result<usize> + 'a {
        move |offset, buf| {
            calls.push((offset, buf.len()));
            let start = offset as usize;
            let n = buf.len().min(data.len().saturating_sub(start));
            buf[..n].copy_from_slice(&data[start..start + n]);
            Ok(n)
        }
    }

    #[test]
    fn unaligned_read_fetches_whole_blocks() {
        let cache = BlockCache::new(16, 1024).unwrap();
        let key: Arc<str> = Arc::from("a");
        let data = data();
        let mut calls = Vec::new();
        let mut buf = [0_u8; 20];
        let n = cache
            .read(&key, 256, 10, &mut buf, fetcher(&data, &mut calls))
            .unwrap();
        assert_eq!(n, 20);
        assert_eq!(&buf[..], &data[10..30]);
        assert_eq!(calls, vec![(0, 32)]);

        // fully cached now
        calls.clear();
        cache
            .read(&key, 256, 16, &mut buf[..8], fetcher(&data, &mut calls))
            .unwrap();
        assert!(calls.is_empty());
    }

    #[test]
    fn only_missing_runs_are_fetched() {
        let cache = BlockCache::new(16, 1024).unwrap();
        let key: Arc<str> = Arc::from("a");
        let data = data();
        let mut calls = Vec::new();
        let mut buf = [0_u8; 16];
        cache
            .read(&key, 256, 32, &mut buf, fetcher(&data, &mut calls))
            .unwrap();

        calls.clear();
        let mut buf = [0_u8; 64];
        let n = cache
            .read(&key, 256, 0, &mut buf, fetcher(&data, &mut calls))
            .unwrap();
        assert_eq!(n, 64);
        assert_eq!(&buf[..], &data[..64]);
        assert_eq!(calls, vec![(0, 32), (48, 16)]);
    }

    #[test]
    fn read_stops_at_file_size() {
        let cache = BlockCache::new(16, 1024).unwrap();
        let key: Arc<str> = Arc::from("a");
        let data = data();
        let mut calls = Vec::new();
        let mut buf = [0_u8; 32];
        let n = cache
            .read(&key, 40, 30, &mut buf, fetcher(&data, &mut calls))
            .unwrap();
        assert_eq!(n, 10);
        assert_eq!(&buf[..10], &data[30..40]);
        assert_eq!(calls, vec![(16, 24)]);

        assert_eq!(
            cache
                .read(&key, 40, 40, &mut buf, fetcher(&data, &mut calls))
                .unwrap(),
            0
        );
    }

    #[test]
    fn eviction_refetches() {
        // room for two blocks
        let cache = BlockCache::new(16, 32).unwrap();
        let key: Arc<str> = Arc::from("a");
        let data = data();
        let mut calls = Vec::new();
        let mut buf = [0_u8; 48];
        let n = cache
            .read(&key, 256, 0, &mut buf, fetcher(&data, &mut calls))
            .unwrap();
        assert_eq!(n, 48);
        assert_eq!(&buf[..], &data[..48]);

        calls.clear();
        cache
            .read(&key, 256, 0, &mut buf[..16], fetcher(&data, &mut calls))
            .unwrap();
        assert_eq!(calls, vec![(0, 16)]);
    }

    #[test]
    fn keys_do_not_collide() {
        let cache = BlockCache::new(8, 1024).unwrap();
        let a: Arc<str> = Arc::from("a");
        let b: Arc<str> = Arc::from("b");
        let mut buf = [0_u8; 4];
        cache
            .read(&a, 8, 0, &mut buf, |_, out| {
                out.fill(1);
                Ok(out.len())
            })
            .unwrap();
        cache
            .read(&b, 8, 0, &mut buf, |_, out| {
                out.fill(2);
                Ok(out.len())
            })
            .unwrap();
        assert_eq!(buf, [2; 4]);
        cache
            .read(&a, 8, 0, &mut buf, |_, _| unreachable!())
            .unwrap();
        assert_eq!(buf, [1; 4]);
    }

    #[test]
    fn zero_sizes_disable() {
        assert!(BlockCache::new(0, 1024).is_none());
        assert!(BlockCache::new(1024, 0).is_none());
        assert!(BlockCache::new(1024, 1).is_some());
    }
}
