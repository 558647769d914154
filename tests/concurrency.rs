//! Concurrency tests: chains stay linear under contention.

use forum_store::{
    CommentEvent, CommentInput, Context, Forum, ForumConfig, HubConfig, LogConfig, LogStorage,
    MemoryStorage, NewComment, NewPost, Page, ParentRef, PostId, PostInput, Storage, StoreError,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const THREADS: usize = 8;
const PER_THREAD: usize = 50;

fn ctx() -> Context {
    Context::background()
}

/// Assert that `comments` is one valid chain rooted at `post_id`.
fn assert_linear_chain(post_id: &PostId, comments: &[forum_store::Comment]) {
    let mut parents = HashSet::new();
    for (i, comment) in comments.iter().enumerate() {
        let expected = if i == 0 {
            ParentRef::Post(post_id.clone())
        } else {
            ParentRef::Comment(comments[i - 1].id.clone())
        };
        assert_eq!(comment.parent, expected, "comment #{} has wrong parent", i);
        assert!(
            parents.insert(comment.parent.clone()),
            "two comments share parent {:?}",
            comment.parent
        );
        if i > 0 {
            assert!(comments[i - 1].created_at < comment.created_at);
        }
    }
}

fn hammer(storage: Arc<dyn Storage>) {
    let post_id = PostId::from("P");
    storage
        .create_post(&ctx(), PostInput::new("P", "t", "b", "ann"))
        .unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    storage
                        .create_comment(
                            &Context::background(),
                            CommentInput::new(format!("c-{}-{}", t, i), "P", "bob", "x"),
                        )
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let comments = storage
        .get_comments_by_post(&ctx(), &post_id, Page::all())
        .unwrap();
    assert_eq!(comments.len(), THREADS * PER_THREAD);
    assert_linear_chain(&post_id, &comments);
}

#[test]
fn test_concurrent_comments_memory() {
    hammer(Arc::new(MemoryStorage::new()));
}

#[test]
fn test_concurrent_comments_log() {
    let dir = TempDir::new().unwrap();
    let storage = LogStorage::create(LogConfig {
        path: dir.path().join("forum"),
        create_if_missing: true,
        sync_interval: 1000,
    })
    .unwrap();
    hammer(Arc::new(storage));
}

#[test]
fn test_posts_are_independent_under_load() {
    let storage = Arc::new(MemoryStorage::new());
    for p in 0..THREADS {
        storage
            .create_post(&ctx(), PostInput::new(format!("P{}", p), "t", "b", "ann"))
            .unwrap();
    }

    thread::scope(|s| {
        for p in 0..THREADS {
            let storage = &storage;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    storage
                        .create_comment(
                            &ctx(),
                            CommentInput::new(format!("c-{}-{}", p, i), format!("P{}", p), "bob", "x"),
                        )
                        .unwrap();
                }
            });
        }
    });

    for p in 0..THREADS {
        let post_id = PostId::from(format!("P{}", p));
        let comments = storage
            .get_comments_by_post(&ctx(), &post_id, Page::all())
            .unwrap();
        assert_eq!(comments.len(), PER_THREAD);
        assert_linear_chain(&post_id, &comments);
    }
}

#[test]
fn test_disable_races_with_comments() {
    let storage = Arc::new(MemoryStorage::new());
    let post_id = PostId::from("P");
    storage
        .create_post(&ctx(), PostInput::new("P", "t", "b", "ann"))
        .unwrap();

    let accepted = AtomicUsize::new(0);
    thread::scope(|s| {
        for t in 0..THREADS {
            let storage = &storage;
            let accepted = &accepted;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    match storage.create_comment(
                        &ctx(),
                        CommentInput::new(format!("c-{}-{}", t, i), "P", "bob", "x"),
                    ) {
                        Ok(_) => {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(StoreError::CommentsDisabled(_)) => {}
                        Err(other) => panic!("unexpected error {:?}", other),
                    }
                }
            });
        }
        s.spawn(|| {
            thread::sleep(Duration::from_millis(1));
            storage.disable_comments(&ctx(), &post_id).unwrap();
        });
    });

    let comments = storage
        .get_comments_by_post(&ctx(), &post_id, Page::all())
        .unwrap();
    assert_eq!(comments.len(), accepted.load(Ordering::SeqCst));
    assert_linear_chain(&post_id, &comments);

    // Once disabled, nothing else gets in
    assert!(matches!(
        storage.create_comment(&ctx(), CommentInput::new("late", "P", "bob", "x")),
        Err(StoreError::CommentsDisabled(_))
    ));
}

#[test]
fn test_concurrent_post_creation() {
    let storage = Arc::new(MemoryStorage::new());

    thread::scope(|s| {
        for t in 0..THREADS {
            let storage = &storage;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    storage
                        .create_post(
                            &ctx(),
                            PostInput::new(format!("P-{}-{}", t, i), "t", "b", "ann"),
                        )
                        .unwrap();
                }
            });
        }
    });

    let posts = storage.list_posts(&ctx(), Page::all()).unwrap();
    assert_eq!(posts.len(), THREADS * PER_THREAD);
    for pair in posts.windows(2) {
        assert!(pair[0].created_at < pair[1].created_at);
    }
}

#[test]
fn test_listener_receives_every_concurrent_comment() {
    let forum = Arc::new(
        Forum::open(ForumConfig {
            hub: HubConfig {
                buffer_size: THREADS * PER_THREAD,
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap(),
    );
    let post = forum
        .create_post(
            &ctx(),
            NewPost {
                title: "busy".into(),
                content: "thread".into(),
                author: "ann".into(),
                comments_enabled: true,
            },
        )
        .unwrap();
    let listener = forum.subscribe(&ctx(), &post.id).unwrap();

    thread::scope(|s| {
        for _ in 0..THREADS {
            let forum = &forum;
            let post_id = post.id.clone();
            s.spawn(move || {
                for _ in 0..PER_THREAD {
                    forum
                        .create_comment(
                            &ctx(),
                            NewComment {
                                post_id: post_id.clone(),
                                parent_id: None,
                                author: "bob".into(),
                                content: "x".into(),
                            },
                        )
                        .unwrap();
                }
            });
        }
    });

    let mut received = HashSet::new();
    while let Ok(event) = listener.try_recv() {
        if let CommentEvent::Comment { comment } = event {
            assert!(received.insert(comment.id), "comment delivered twice");
        }
    }
    assert_eq!(received.len(), THREADS * PER_THREAD);
}

#[test]
fn test_subscribe_unsubscribe_while_publishing() {
    let forum = Arc::new(Forum::open(ForumConfig::default()).unwrap());
    let post = forum
        .create_post(
            &ctx(),
            NewPost {
                title: "churn".into(),
                content: "thread".into(),
                author: "ann".into(),
                comments_enabled: true,
            },
        )
        .unwrap();

    thread::scope(|s| {
        let post_id = post.id.clone();
        let writer = &forum;
        s.spawn(move || {
            for _ in 0..200 {
                writer
                    .create_comment(
                        &ctx(),
                        NewComment {
                            post_id: post_id.clone(),
                            parent_id: None,
                            author: "bob".into(),
                            content: "x".into(),
                        },
                    )
                    .unwrap();
            }
        });

        for _ in 0..4 {
            let forum = &forum;
            let post_id = post.id.clone();
            s.spawn(move || {
                for _ in 0..50 {
                    let handle = forum.subscribe(&ctx(), &post_id).unwrap();
                    forum.unsubscribe(handle.id);
                }
            });
        }
    });

    assert_eq!(forum.hub().listener_count(), 0);
    assert_eq!(
        forum.comments(&ctx(), &post.id, Page::all()).unwrap().len(),
        200
    );
}
