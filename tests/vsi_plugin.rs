use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gdal_io::errors::GdalError;
use gdal_io::raster::IoOptions;
use gdal_io::vsi::{
    get_vsi_mem_file_bytes_owned, register_handler, KeyReader, MultiKeyReader, VsiFile,
    VsiHandlerOptions,
};
use gdal_io::{Dataset, DatasetOptions, Driver, GdalOpenFlags};

const SIZE: usize = 64;

fn pixels() -> Vec<u8> {
    (0..SIZE * SIZE).map(|i| (i * 7 % 251) as u8).collect()
}

/// A tiled GeoTIFF holding [`pixels`], as bytes.
fn geotiff_bytes(name: &str) -> Vec<u8> {
    let path = format!("/vsimem/{name}.tif");
    {
        let mut ds = Driver::get_by_name("GTiff")
            .unwrap()
            .create_with_band_type_with_options::<u8, _>(
                &path,
                SIZE,
                SIZE,
                1,
                &["TILED=YES", "BLOCKXSIZE=16", "BLOCKYSIZE=16"],
                &Default::default(),
            )
            .unwrap();
        ds.write((0, 0), &pixels(), (SIZE, SIZE), &IoOptions::default())
            .unwrap();
    }
    get_vsi_mem_file_bytes_owned(&path).unwrap()
}

/// In-memory store counting the requests it serves. Keys starting with `broken`
/// fail with a generic I/O error.
#[derive(Default)]
struct Store {
    files: HashMap<String, Vec<u8>>,
    reads: AtomicUsize,
    multi_reads: AtomicUsize,
}

impl Store {
    fn with(key: &str, data: Vec<u8>) -> Self {
        let mut files = HashMap::new();
        files.insert(key.to_string(), data);
        Store {
            files,
            ..Default::default()
        }
    }

    fn requests(&self) -> usize {
        self.reads.load(Ordering::SeqCst) + self.multi_reads.load(Ordering::SeqCst)
    }

    fn get(&self, key: &str) -> io::Result<&[u8]> {
        if key.starts_with("broken") {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
        }
        self.files
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn copy(data: &[u8], buf: &mut [u8], offset: u64) -> usize {
        let data = data.get(offset as usize..).unwrap_or_default();
        let n = buf.len().min(data.len());
        buf[..n].copy_from_slice(&data[..n]);
        n
    }
}

impl KeyReader for Store {
    fn size(&self, key: &str) -> io::Result<u64> {
        self.get(key).map(|data| data.len() as u64)
    }

    fn read_at(&self, key: &str, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(Self::copy(self.get(key)?, buf, offset))
    }
}

/// The same store with batched reads.
struct MultiStore(Store);

impl KeyReader for MultiStore {
    fn size(&self, key: &str) -> io::Result<u64> {
        self.0.size(key)
    }

    fn read_at(&self, key: &str, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.0.read_at(key, buf, offset)
    }

    fn multi_reader(&self) -> Option<&dyn MultiKeyReader> {
        Some(self)
    }
}

impl MultiKeyReader for MultiStore {
    fn read_at_multi(
        &self,
        key: &str,
        bufs: &mut [&mut [u8]],
        offsets: &[u64],
    ) -> io::Result<Vec<usize>> {
        self.0.multi_reads.fetch_add(1, Ordering::SeqCst);
        let data = self.0.get(key)?;
        Ok(bufs
            .iter_mut()
            .zip(offsets)
            .map(|(buf, &offset)| Store::copy(data, buf, offset))
            .collect())
    }
}

fn read_all(path: &str) -> Vec<u8> {
    let ds = Dataset::open(path).unwrap();
    let mut buf = vec![0_u8; SIZE * SIZE];
    ds.rasterband(1)
        .unwrap()
        .read((0, 0), &mut buf, (SIZE, SIZE), &IoOptions::default())
        .unwrap();
    buf
}

#[test]
fn test_reads_through_plugin() {
    let bytes = geotiff_bytes("plain");
    let unbuffered = VsiHandlerOptions {
        buffer_size: 0,
        ..Default::default()
    };
    let plain = Arc::new(Store::with("a.tif", bytes.clone()));
    let multi = Arc::new(MultiStore(Store::with("a.tif", bytes)));
    register_handler("plaintest://", plain.clone(), unbuffered).unwrap();
    register_handler("multitest://", multi.clone(), unbuffered).unwrap();

    assert_eq!(read_all("plaintest://a.tif"), pixels());
    assert_eq!(read_all("multitest://a.tif"), pixels());

    // same pixels, tiles fetched in batches
    assert_eq!(plain.multi_reads.load(Ordering::SeqCst), 0);
    assert!(multi.0.multi_reads.load(Ordering::SeqCst) >= 1);
    assert!(
        multi.0.requests() < plain.requests(),
        "{} >= {}",
        multi.0.requests(),
        plain.requests()
    );

    // a window spanning several tiles
    let ds = Dataset::open("multitest://a.tif").unwrap();
    let mut window = vec![0_u8; 40 * 3];
    ds.rasterband(1)
        .unwrap()
        .read((10, 30), &mut window, (40, 3), &IoOptions::default())
        .unwrap();
    let expected: Vec<u8> = (30..33)
        .flat_map(|y| (10..50).map(move |x| pixels()[y * SIZE + x]))
        .collect();
    assert_eq!(window, expected);
}

#[test]
fn test_cache_reduces_store_requests() {
    let bytes = geotiff_bytes("cached");
    let cached = Arc::new(Store::with("a.tif", bytes.clone()));
    let uncached = Arc::new(Store::with("a.tif", bytes));
    register_handler("cachedtest://", cached.clone(), VsiHandlerOptions::default()).unwrap();
    register_handler(
        "uncachedtest://",
        uncached.clone(),
        VsiHandlerOptions {
            buffer_size: 0,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(read_all("cachedtest://a.tif"), pixels());
    assert_eq!(read_all("uncachedtest://a.tif"), pixels());

    let cached_reads = cached.reads.load(Ordering::SeqCst);
    let uncached_reads = uncached.reads.load(Ordering::SeqCst);
    assert!(cached_reads >= 1);
    assert!(
        cached_reads <= uncached_reads,
        "{cached_reads} > {uncached_reads}"
    );

    // a second pass is served from the cache
    assert_eq!(read_all("cachedtest://a.tif"), pixels());
    assert_eq!(cached.reads.load(Ordering::SeqCst), cached_reads);
}

fn read_byte(file: &mut VsiFile) -> u8 {
    let mut byte = [0_u8; 1];
    file.read_exact(&mut byte).unwrap();
    byte[0]
}

#[test]
fn test_read_ahead_without_shared_cache() {
    let data: Vec<u8> = (0..200).map(|i| i as u8).collect();
    let store = Arc::new(Store::with("data.bin", data));
    register_handler(
        "nocachetest://",
        store.clone(),
        VsiHandlerOptions {
            buffer_size: 64,
            cache_size: 0,
            ..Default::default()
        },
    )
    .unwrap();

    // small reads are served from the file's own block
    let mut first = VsiFile::open("nocachetest://data.bin").unwrap();
    for i in 0..10 {
        assert_eq!(read_byte(&mut first), i);
    }
    assert_eq!(store.reads.load(Ordering::SeqCst), 1);

    // nothing is shared between files
    let mut second = VsiFile::open("nocachetest://data.bin").unwrap();
    assert_eq!(read_byte(&mut second), 0);
    assert_eq!(store.reads.load(Ordering::SeqCst), 2);

    // and the other file's block is still there
    assert_eq!(read_byte(&mut first), 10);
    assert_eq!(store.reads.load(Ordering::SeqCst), 2);

    // crossing into the next block fetches it
    first.seek(SeekFrom::Start(63)).unwrap();
    assert_eq!(read_byte(&mut first), 63);
    assert_eq!(read_byte(&mut first), 64);
    assert_eq!(store.reads.load(Ordering::SeqCst), 3);
}

#[test]
fn test_shared_cache_across_files() {
    let data: Vec<u8> = (0..200).map(|i| i as u8).collect();
    let store = Arc::new(Store::with("data.bin", data));
    register_handler(
        "sharedcachetest://",
        store.clone(),
        VsiHandlerOptions {
            buffer_size: 64,
            cache_size: 256,
            ..Default::default()
        },
    )
    .unwrap();

    let mut first = VsiFile::open("sharedcachetest://data.bin").unwrap();
    assert_eq!(read_byte(&mut first), 0);
    let mut second = VsiFile::open("sharedcachetest://data.bin").unwrap();
    assert_eq!(read_byte(&mut second), 0);
    assert_eq!(store.reads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_missing_and_failing_keys() {
    register_handler(
        "errtest://",
        Arc::new(Store::default()),
        VsiHandlerOptions::default(),
    )
    .unwrap();

    let err = Dataset::open("errtest://missing.tif").unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
    assert!(!err.is_io_error());

    let err = Dataset::open("errtest://broken.tif").unwrap_err();
    assert!(err.is_io_error(), "{err:?}");
    assert!(!err.is_not_found());

    let err = VsiFile::open("errtest://missing.bin").unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
}

#[test]
fn test_update_is_rejected() {
    register_handler(
        "readonlytest://",
        Arc::new(Store::with("a.tif", geotiff_bytes("readonly"))),
        VsiHandlerOptions::default(),
    )
    .unwrap();

    let res = Dataset::open_ex(
        "readonlytest://a.tif",
        DatasetOptions {
            open_flags: GdalOpenFlags::GDAL_OF_UPDATE | GdalOpenFlags::GDAL_OF_RASTER,
            ..Default::default()
        },
    );
    assert!(res.is_err());
}

#[test]
fn test_duplicate_prefix() {
    let store = Arc::new(Store::default());
    register_handler("duptest://", store.clone(), VsiHandlerOptions::default()).unwrap();
    assert_eq!(
        register_handler("duptest://", store.clone(), VsiHandlerOptions::default()),
        Err(GdalError::DuplicatePrefix("duptest://".to_string()))
    );
    assert!(matches!(
        register_handler("/vsimem/", store, VsiHandlerOptions::default()),
        Err(GdalError::DuplicatePrefix(_))
    ));
}

#[test]
fn test_keep_prefix_in_keys() {
    let mut file = Vec::new();
    file.extend_from_slice(b"0123456789");
    register_handler(
        "keeptest://",
        Arc::new(Store::with("keeptest://data.bin", file)),
        VsiHandlerOptions {
            strip_prefix: false,
            ..Default::default()
        },
    )
    .unwrap();

    let mut f = VsiFile::open("keeptest://data.bin").unwrap();
    f.seek(SeekFrom::Start(4)).unwrap();
    let mut rest = String::new();
    f.read_to_string(&mut rest).unwrap();
    assert_eq!(rest, "456789");
}
