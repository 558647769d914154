//! Property tests for the comment chain and post lifecycle.

use forum_store::{
    CommentInput, Context, MemoryStorage, Page, ParentRef, PostId, PostInput, StoreError,
    MAX_COMMENT_CHARS,
};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Comment { post: usize, len: usize },
    Disable { post: usize },
}

fn op(posts: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..posts, 0..MAX_COMMENT_CHARS + 50).prop_map(|(post, len)| Op::Comment { post, len }),
        1 => (0..posts).prop_map(|post| Op::Disable { post }),
    ]
}

fn post_id(i: usize) -> PostId {
    PostId::from(format!("P{}", i))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever sequence of operations runs, each post's chain is linear,
    /// holds exactly the accepted comments, and is closed once disabled.
    #[test]
    fn prop_chain_matches_model(ops in prop::collection::vec(op(3), 0..60)) {
        let ctx = Context::background();
        let store = MemoryStorage::new();
        for i in 0..3 {
            store.create_post(&ctx, PostInput::new(post_id(i), "t", "b", "ann")).unwrap();
        }

        let mut accepted: Vec<Vec<String>> = vec![Vec::new(); 3];
        let mut disabled = [false; 3];

        for (n, op) in ops.into_iter().enumerate() {
            match op {
                Op::Comment { post, len } => {
                    let id = format!("C{}", n);
                    let result = store.create_comment(
                        &ctx,
                        CommentInput::new(id.clone(), post_id(post), "bob", "x".repeat(len)),
                    );
                    if disabled[post] {
                        prop_assert!(matches!(result, Err(StoreError::CommentsDisabled(_))));
                    } else if len > MAX_COMMENT_CHARS {
                        let is_too_long = matches!(result, Err(StoreError::CommentTooLong { .. }));
                        prop_assert!(is_too_long);
                    } else {
                        prop_assert!(result.is_ok());
                        accepted[post].push(id);
                    }
                }
                Op::Disable { post } => {
                    store.disable_comments(&ctx, &post_id(post)).unwrap();
                    disabled[post] = true;
                }
            }
        }

        for i in 0..3 {
            let chain = store.get_comments_by_post(&ctx, &post_id(i), Page::all()).unwrap();
            let ids: Vec<_> = chain.iter().map(|c| c.id.0.clone()).collect();
            prop_assert_eq!(&ids, &accepted[i]);

            for (k, comment) in chain.iter().enumerate() {
                let expected = if k == 0 {
                    ParentRef::Post(post_id(i))
                } else {
                    ParentRef::Comment(chain[k - 1].id.clone())
                };
                prop_assert_eq!(&comment.parent, &expected);
            }

            let post = store.get_post(&ctx, &post_id(i)).unwrap();
            prop_assert_eq!(post.comments_enabled, !disabled[i]);
        }
    }

    /// Paging a post list is slicing the full list.
    #[test]
    fn prop_paging_is_slicing(count in 0usize..20, limit in 0usize..25, offset in 0usize..25) {
        let ctx = Context::background();
        let store = MemoryStorage::new();
        for i in 0..count {
            store.create_post(&ctx, PostInput::new(post_id(i), "t", "b", "ann")).unwrap();
        }

        let all = store.list_posts(&ctx, Page::all()).unwrap();
        let page = store.list_posts(&ctx, Page::new(limit, offset)).unwrap();
        let expected: Vec<_> = all.iter().skip(offset).take(limit).cloned().collect();
        prop_assert_eq!(page, expected);
    }
}
