use std::sync::Arc;

use criterion::{
    criterion_group, criterion_main, AxisScale, BenchmarkId, Criterion, PlotConfiguration,
    Throughput,
};
use remote_cells::{
    element::PixelType,
    image::{CellCachePolicy, CellSizePolicy, ImageIndex, ImageOpenOptions},
    region::Region,
    remote::{ImageId, MemoryImage, MemoryRemoteStore, PixelsMetadata, RemoteStoreHandle},
};

fn store(size: u64) -> RemoteStoreHandle {
    let store = MemoryRemoteStore::new();
    let metadata = PixelsMetadata {
        size_x: size,
        size_y: size,
        size_z: 4,
        size_c: 1,
        size_t: 1,
        pixel_type: PixelType::UInt16,
        physical_size_x: None,
        physical_size_y: None,
        physical_size_z: None,
    };
    store.add_image(
        ImageId(1),
        MemoryImage::new(metadata, vec![], |_, _, x, y| ((x * 31 + y) % 65536) as f64),
    );
    Arc::new(store)
}

fn options(cell_cache: CellCachePolicy) -> ImageOpenOptions {
    ImageOpenOptions::new(ImageId(1))
        .with_cell_size(CellSizePolicy::Fixed { x: 256, y: 256 })
        .with_cell_cache(cell_cache)
}

fn read_region_cold(c: &mut Criterion) {
    let plot_config = PlotConfiguration::default().summary_scale(AxisScale::Logarithmic);
    let mut group = c.benchmark_group("read_region_cold");
    group.plot_config(plot_config);
    for size in [512u64, 1024, 2048] {
        let store = store(size);
        group.throughput(Throughput::Bytes(size * size * 4 * 2));
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| {
                let index =
                    ImageIndex::<u16>::open(store.clone(), &options(CellCachePolicy::Unbounded))
                        .unwrap();
                let volume = index.get_volume(0, 0, 0).unwrap();
                volume
                    .read_region(&Region::new_with_shape([size, size, 4]))
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn read_region_warm(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_region_warm");
    for (name, policy) in [
        ("unbounded", CellCachePolicy::Unbounded),
        ("lru_cell_limit", CellCachePolicy::LruCellLimit { capacity: 64 }),
        (
            "lru_size_limit",
            CellCachePolicy::LruSizeLimit {
                capacity: 64 * 256 * 256 * 2,
            },
        ),
    ] {
        let size = 1024u64;
        let index = ImageIndex::<u16>::open(store(size), &options(policy)).unwrap();
        let volume = index.get_volume(0, 0, 0).unwrap();
        let region = Region::new_with_ranges(&[100..900, 100..900, 0..4]);
        volume.read_region(&region).unwrap();
        group.throughput(Throughput::Elements(region.num_elements()));
        group.bench_function(name, |b| {
            b.iter(|| volume.read_region(&region).unwrap());
        });
    }
    group.finish();
}

fn get_cell_warm(c: &mut Criterion) {
    let index =
        ImageIndex::<u16>::open(store(1024), &options(CellCachePolicy::Unbounded)).unwrap();
    let volume = index.get_volume(0, 0, 0).unwrap();
    volume.get_cell(1, 2, 3).unwrap();
    c.bench_function("get_cell_warm", |b| {
        b.iter(|| volume.get_cell(1, 2, 3).unwrap());
    });
}

criterion_group!(benches, read_region_cold, read_region_warm, get_cell_warm);
criterion_main!(benches);
