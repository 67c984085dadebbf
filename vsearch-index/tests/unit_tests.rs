//! Cross-module tests + deadlock detection

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::RwLock;
use rand::Rng;
use tempfile::TempDir;

use vsearch_core::{Compression, Embedder, LshConfig, PersistenceConfig, Vector};
use vsearch_index::{
    dot_product, is_unit, normalize, normalized, similarity, BitsetPool, Capabilities, Error,
    ExactIndex, GraphBuilder, Kernel, LshIndex, VectorMath,
};

/// Route index logs to the test harness; filter with RUST_LOG
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn random_vec(dim: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

// ============================================================================
// SIMD tests
// ============================================================================

#[test]
fn test_dot_product_correctness() {
    let a = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
    let b = vec![8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0];
    let expected: f64 = a.iter().zip(&b).map(|(x, y)| (x * y) as f64).sum();
    assert!((dot_product(&a, &b).unwrap() - expected).abs() < 1e-5);
}

#[test]
fn test_similarity_384_dim_matches_scalar() {
    let a = random_vec(384);
    let b = random_vec(384);
    let fast = similarity(&a, &b).unwrap();
    let slow = VectorMath::scalar().similarity(&a, &b).unwrap();
    assert!((fast - slow).abs() < 1e-4);
    assert!((-1.0..=1.0).contains(&slow));
}

#[test]
fn test_similarity_of_parallel_vectors() {
    let a = random_vec(100);
    let b: Vec<f32> = a.iter().map(|x| x * 3.5).collect();
    assert!((similarity(&a, &b).unwrap() - 1.0).abs() < 1e-4);
    assert!((similarity(&a, &a).unwrap() - 1.0).abs() < 1e-4);
}

#[test]
fn test_similarity_zero_and_mismatch() {
    assert_eq!(similarity(&[0.0; 8], &random_vec(8)).unwrap(), 0.0);
    assert!(matches!(
        similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]),
        Err(Error::DimensionMismatch { expected: 2, actual: 3 })
    ));
}

#[test]
fn test_normalize_unit_length() {
    let mut v = random_vec(768);
    assert!(normalize(&mut v));
    assert!(is_unit(&v));

    let n = normalized(&[0.0, 0.0, 0.0]);
    assert_eq!(n, vec![0.0, 0.0, 0.0]);
    assert!(!is_unit(&n));
}

#[test]
fn test_portable_kernel_is_scalar() {
    let math = VectorMath::new(&Capabilities::portable());
    assert_eq!(math.kernel(), Kernel::Scalar);
    assert_eq!(math, VectorMath::scalar());
}

// ============================================================================
// Exact index tests
// ============================================================================

#[test]
fn test_exact_index_basic() {
    let mut index = ExactIndex::new();
    for i in 0..100u64 {
        index.add(random_vec(64), i).unwrap();
    }
    assert_eq!(index.len(), 100);
    assert_eq!(index.dimension(), Some(64));

    let results = index.search(&mut random_vec(64), 10).unwrap();
    assert_eq!(results.len(), 10);
    assert!(results.windows(2).all(|w| w[0].relevance >= w[1].relevance));
}

#[test]
fn test_exact_index_finds_stored_vector() {
    let mut index = ExactIndex::new();
    let vectors: Vec<Vec<f32>> = (0..200).map(|_| random_vec(32)).collect();
    for (i, v) in vectors.iter().enumerate() {
        index.add(v.clone(), format!("doc-{}", i)).unwrap();
    }

    let mut query = vectors[123].clone();
    let results = index.search(&mut query, 1).unwrap();
    assert_eq!(results[0].payload, "doc-123");
    assert!((results[0].relevance - 1.0).abs() < 1e-4);
}

// ============================================================================
// Persistence tests
// ============================================================================

#[test]
fn test_exact_index_file_roundtrip() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index.vsx");

    let mut index = ExactIndex::new();
    for i in 0..50 {
        index.add(random_vec(32), format!("payload {}", i)).unwrap();
    }
    index.save(&path).unwrap();

    let loaded: ExactIndex<String> = ExactIndex::load(&path).unwrap();
    assert_eq!(loaded.len(), 50);

    let query = random_vec(32);
    let r1 = index.search(&mut query.clone(), 5).unwrap();
    let r2 = loaded.search(&mut query.clone(), 5).unwrap();
    assert_eq!(
        r1.iter().map(|r| &r.payload).collect::<Vec<_>>(),
        r2.iter().map(|r| &r.payload).collect::<Vec<_>>()
    );
}

#[test]
fn test_uncompressed_file_layout() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("raw.vsx");
    let config = PersistenceConfig {
        compression: Compression::None,
        level: 0,
    };

    let mut index = ExactIndex::new();
    index.add(vec![1.0, 0.0], vec![0xAB, 0xCD]).unwrap();
    index.save_with(&path, &config).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    // version, count, dim, 2 x f32, payload len, payload
    assert_eq!(bytes.len(), 1 + 1 + 1 + 8 + 1 + 2);
    assert_eq!(&bytes[..3], &[1, 1, 2]);
    assert_eq!(&bytes[11..], &[2, 0xAB, 0xCD]);

    let loaded: ExactIndex<Vec<u8>> = ExactIndex::load_with(&path, &config).unwrap();
    assert_eq!(loaded.get(0).unwrap().payload, vec![0xAB, 0xCD]);
}

#[test]
fn test_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let result = ExactIndex::<String>::load(&temp_dir.path().join("absent.vsx"));
    assert!(matches!(result, Err(Error::Io { .. })));
}

#[test]
fn test_opaque_payload_file_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ids.vsx");

    let mut index = ExactIndex::new();
    index.add(vec![0.5, 0.5, 0.5], 77u32).unwrap();
    index.save(&path).unwrap();

    let loaded: ExactIndex<u32> = ExactIndex::load(&path).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.get(0).unwrap().payload, 0);
}

// ============================================================================
// LSH + exact reranking
// ============================================================================

#[test]
fn test_lsh_candidates_rerank_with_exact() {
    let dim = 24;
    let config = LshConfig {
        capacity: 500,
        dimension: dim,
        collision_probability: 0.2,
        seed: Some(42),
    };
    let mut lsh = LshIndex::new(&config).unwrap();

    let vectors: Vec<Vec<f32>> = (0..500).map(|_| random_vec(dim)).collect();
    for (i, v) in vectors.iter().enumerate() {
        lsh.add(v, i).unwrap();
    }
    assert_eq!(lsh.len(), 500);

    let query = vectors[10].clone();
    let candidates = lsh.query(&query).unwrap();
    assert!(candidates.contains(&10));

    let mut rerank = ExactIndex::with_capacity(candidates.len());
    for &id in &candidates {
        rerank.add(vectors[id].clone(), id).unwrap();
    }
    let best = rerank.search(&mut query.clone(), 1).unwrap();
    assert_eq!(best[0].payload, 10);
}

// ============================================================================
// Graph tests
// ============================================================================

#[test]
fn test_graph_build_and_search() {
    init_tracing();
    let mut builder = GraphBuilder::new(Default::default()).unwrap();
    let vectors: Vec<Vec<f32>> = (0..300).map(|_| random_vec(32)).collect();
    for v in &vectors {
        builder.add_node(v.clone()).unwrap();
    }
    let graph = builder.build();
    assert_eq!(graph.len(), 300);

    for node in 0..graph.len() {
        assert!(graph.neighbors(node).unwrap().len() <= graph.config().max_neighbors);
        assert!(is_unit(graph.vector(node).unwrap()));
    }

    let results = graph.search(&mut vectors[42].clone(), 10).unwrap();
    assert_eq!(results.len(), 10);
    assert_eq!(results[0].node, 42);
}

#[test]
fn test_graph_rejects_inconsistent_dimension() {
    let mut builder = GraphBuilder::new(Default::default()).unwrap();
    assert_eq!(builder.add_node(random_vec(8)).unwrap(), 0);
    assert!(builder.add_node(random_vec(9)).is_err());
    assert_eq!(builder.len(), 1);
}

// ============================================================================
// Embedder pipeline
// ============================================================================

/// Character-trigram hashing embedder
struct TrigramEmbedder;

impl Embedder for TrigramEmbedder {
    fn embed(&self, text: &str) -> vsearch_core::Result<Vector> {
        let mut v = vec![0.0; 64];
        let bytes = text.as_bytes();
        for w in bytes.windows(3) {
            let h = (w[0] as usize * 31 + w[1] as usize) * 31 + w[2] as usize;
            v[h % 64] += 1.0;
        }
        Ok(v)
    }

    fn dimension(&self) -> usize {
        64
    }
}

#[test]
fn test_embedder_feeds_exact_index() {
    let embedder = TrigramEmbedder;
    let docs = ["the quick brown fox", "lorem ipsum dolor sit amet", "vector search engine"];

    let mut index = ExactIndex::with_dimension(embedder.dimension());
    for (doc, vector) in docs.iter().zip(embedder.embed_batch(&docs).unwrap()) {
        index.add(vector, doc.to_string()).unwrap();
    }

    let mut query = embedder.embed("quick brown fox").unwrap();
    let results = index.search(&mut query, 1).unwrap();
    assert_eq!(results[0].payload, "the quick brown fox");
}

// ============================================================================
// Deadlock detection test
// ============================================================================

#[test]
fn test_concurrent_no_deadlock() {
    let dim = 32;
    let index = Arc::new(RwLock::new(ExactIndex::<u64>::with_dimension(dim)));
    let lsh = Arc::new(RwLock::new(
        LshIndex::<u64>::new(&LshConfig {
            capacity: 1000,
            dimension: dim,
            collision_probability: 0.1,
            seed: Some(7),
        })
        .unwrap(),
    ));

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let index = Arc::clone(&index);
            let lsh = Arc::clone(&lsh);
            thread::spawn(move || {
                for i in 0..50u64 {
                    let v = random_vec(dim);
                    if i % 2 == 0 {
                        let id = t * 1000 + i;
                        index.write().add(v.clone(), id).unwrap();
                        lsh.write().add(&v, id).unwrap();
                    } else {
                        let _ = index.read().search(&mut v.clone(), 5).unwrap();
                        let _ = lsh.read().query(&v).unwrap();
                    }
                }
                t
            })
        })
        .collect();

    // Timeout-based deadlock detection
    let (tx, rx) = std::sync::mpsc::channel();
    thread::spawn(move || {
        for h in handles {
            let _ = h.join();
        }
        let _ = tx.send(());
    });

    assert!(
        rx.recv_timeout(Duration::from_secs(10)).is_ok(),
        "Deadlock detected: threads did not complete within 10s"
    );
    assert_eq!(index.read().len(), 100);
    assert_eq!(lsh.read().len(), 100);
}

#[test]
fn test_bitset_pool_shared_across_threads() {
    let pool = Arc::new(BitsetPool::new());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for i in 0..500u32 {
                    let mut visited = pool.get();
                    assert!(visited.is_empty());
                    visited.insert(i);
                    pool.free(visited);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert!(pool.len() <= 4);
    assert_eq!(pool.available(), pool.len());
}
