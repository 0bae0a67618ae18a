use domains::validation::MAX_CONTENT_CHARS;
use domains::{
    DomainError, Message, MessageId, MessageSort, PageRequest, SortDirection, SortField,
    VoteKind,
};
use integration_tests::{author, backends, user};
use tokio_test::{assert_err, assert_ok};

fn ids(messages: &[Message]) -> Vec<MessageId> {
    messages.iter().map(|m| m.id).collect()
}

#[tokio::test]
async fn example_thread_scenario() {
    for b in backends().await {
        let svc = &b.service;
        let a = assert_ok!(svc.create(&user("u1"), "hello", None).await);
        let reply = assert_ok!(svc.create(&user("u2"), "hi back", Some(a.id)).await);

        assert_ok!(svc.vote(&user("u3"), a.id, VoteKind::Like).await);
        assert_ok!(svc.vote(&user("u4"), a.id, VoteKind::Like).await);
        let a = assert_ok!(svc.vote(&user("u4"), a.id, VoteKind::Dislike).await).message;

        assert_eq!(a.votes.like_voters().iter().collect::<Vec<_>>(), vec![&author("u3")], "{}", b.name);
        assert_eq!(a.votes.dislike_voters().iter().collect::<Vec<_>>(), vec![&author("u4")], "{}", b.name);
        assert_eq!(a.votes.like_count(), 1);
        assert_eq!(a.votes.dislike_count(), 1);

        let children = assert_ok!(svc.list_children(a.id, MessageSort::default()).await);
        assert_eq!(ids(&children), vec![reply.id], "{}", b.name);
    }
}

#[tokio::test]
async fn toggle_properties() {
    for b in backends().await {
        let svc = &b.service;
        let m = assert_ok!(svc.create(&user("u1"), "hello", None).await);

        assert_ok!(svc.vote(&user("u5"), m.id, VoteKind::Like).await);
        let after = assert_ok!(svc.vote(&user("u5"), m.id, VoteKind::Like).await).message;
        assert_eq!(after.votes.vote_of(&author("u5")), None, "{}", b.name);
        assert_eq!(after.votes.like_count() + after.votes.dislike_count(), 0);

        assert_ok!(svc.vote(&user("u5"), m.id, VoteKind::Like).await);
        let after = assert_ok!(svc.vote(&user("u5"), m.id, VoteKind::Dislike).await).message;
        assert!(!after.votes.like_voters().contains(&author("u5")), "{}", b.name);
        assert!(after.votes.dislike_voters().contains(&author("u5")));
        assert_eq!(after.votes.like_count(), 0);
        assert_eq!(after.votes.dislike_count(), 1);

        // The author may vote on their own message.
        let own = assert_ok!(svc.vote(&user("u1"), m.id, VoteKind::Like).await).message;
        assert_eq!(own.votes.vote_of(&author("u1")), Some(VoteKind::Like));

        let stored = assert_ok!(svc.get(m.id).await);
        assert_eq!(stored.votes, own.votes, "{}", b.name);
        assert_eq!(stored.updated_at, m.updated_at, "votes do not touch updatedAt");
    }
}

#[tokio::test]
async fn content_length_boundaries() {
    for b in backends().await {
        let svc = &b.service;
        let at_limit = "a".repeat(MAX_CONTENT_CHARS);
        let over_limit = "a".repeat(MAX_CONTENT_CHARS + 1);

        assert!(matches!(
            svc.create(&user("u1"), "", None).await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            svc.create(&user("u1"), &over_limit, None).await,
            Err(DomainError::Validation(_))
        ));
        assert_ok!(svc.create(&user("u1"), "a", None).await);
        let long = assert_ok!(svc.create(&user("u1"), &at_limit, None).await);
        assert_eq!(assert_ok!(svc.get(long.id).await).content.chars().count(), MAX_CONTENT_CHARS);

        let page = assert_ok!(svc.list_roots(PageRequest::default(), MessageSort::default()).await);
        assert_eq!(page.total, 2, "{}", b.name);
    }
}

#[tokio::test]
async fn reply_to_unknown_parent_fails() {
    for b in backends().await {
        let err = assert_err!(
            b.service
                .create(&user("u1"), "hello?", Some(MessageId::new()))
                .await
        );
        assert!(matches!(err, DomainError::NotFound { .. }), "{}", b.name);
    }
}

#[tokio::test]
async fn non_owner_cannot_edit_or_delete() {
    for b in backends().await {
        let svc = &b.service;
        let m = assert_ok!(svc.create(&user("u1"), "hello", None).await);
        assert_ok!(svc.vote(&user("u3"), m.id, VoteKind::Like).await);
        let before = assert_ok!(svc.get(m.id).await);

        let err = assert_err!(svc.edit(&user("u2"), m.id, "defaced").await);
        assert!(matches!(err, DomainError::Forbidden(_)), "{}", b.name);
        let err = assert_err!(svc.delete(&user("u2"), m.id).await);
        assert!(matches!(err, DomainError::Forbidden(_)), "{}", b.name);

        assert_eq!(assert_ok!(svc.get(m.id).await), before, "{}", b.name);

        let err = assert_err!(svc.edit(&user("u1"), MessageId::new(), "x").await);
        assert!(matches!(err, DomainError::NotFound { .. }));
        let err = assert_err!(svc.delete(&user("u1"), MessageId::new()).await);
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}

#[tokio::test]
async fn owner_edit_refreshes_updated_at_only() {
    for b in backends().await {
        let svc = &b.service;
        let m = assert_ok!(svc.create(&user("u1"), "hello", None).await);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let edited = assert_ok!(svc.edit(&user("u1"), m.id, "  hello, edited  ").await);
        assert_eq!(edited.content, "hello, edited");
        assert_eq!(edited.created_at, m.created_at, "{}", b.name);
        assert!(edited.updated_at > m.updated_at, "{}", b.name);

        let err = assert_err!(svc.edit(&user("u1"), m.id, "   ").await);
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(assert_ok!(svc.get(m.id).await).content, "hello, edited");
    }
}

#[tokio::test]
async fn delete_leaves_orphans_reachable_by_id_only() {
    for b in backends().await {
        let svc = &b.service;
        let root = assert_ok!(svc.create(&user("u1"), "hello", None).await);
        let reply = assert_ok!(svc.create(&user("u2"), "hi back", Some(root.id)).await);
        let nested = assert_ok!(svc.create(&user("u3"), "deeper", Some(reply.id)).await);

        assert_ok!(svc.delete(&user("u1"), root.id).await);

        assert!(matches!(svc.get(root.id).await, Err(DomainError::NotFound { .. })));
        let orphan = assert_ok!(svc.get(reply.id).await);
        assert_eq!(orphan.parent_id, Some(root.id), "{}", b.name);
        assert!(assert_ok!(svc.list_children(root.id, MessageSort::default()).await).is_empty());
        // The orphan's own thread is still browsable from it.
        let below = assert_ok!(svc.list_children(reply.id, MessageSort::default()).await);
        assert_eq!(ids(&below), vec![nested.id], "{}", b.name);
    }
}

#[tokio::test]
async fn list_children_filters_and_orders_by_every_field() {
    for b in backends().await {
        let svc = &b.service;
        let root = assert_ok!(svc.create(&user("u1"), "root", None).await);
        let other_root = assert_ok!(svc.create(&user("u1"), "other", None).await);

        let c0 = assert_ok!(svc.create(&user("u2"), "c0", Some(root.id)).await);
        let c1 = assert_ok!(svc.create(&user("u2"), "c1", Some(root.id)).await);
        let c2 = assert_ok!(svc.create(&user("u2"), "c2", Some(root.id)).await);
        assert_ok!(svc.create(&user("u2"), "grandchild", Some(c0.id)).await);
        assert_ok!(svc.create(&user("u2"), "elsewhere", Some(other_root.id)).await);

        // likes: c0=2, c1=0, c2=1; dislikes: c0=1, c1=2, c2=0
        for (voter, target, kind) in [
            ("a", c0.id, VoteKind::Like),
            ("b", c0.id, VoteKind::Like),
            ("c", c0.id, VoteKind::Dislike),
            ("a", c1.id, VoteKind::Dislike),
            ("b", c1.id, VoteKind::Dislike),
            ("c", c2.id, VoteKind::Like),
        ] {
            assert_ok!(svc.vote(&user(voter), target, kind).await);
        }

        let cases = [
            (SortField::CreatedAt, vec![c0.id, c1.id, c2.id]),
            (SortField::LikeCount, vec![c1.id, c2.id, c0.id]),
            (SortField::DislikeCount, vec![c2.id, c0.id, c1.id]),
        ];
        for (field, ascending) in cases {
            let asc = assert_ok!(
                svc.list_children(root.id, MessageSort::new(field, SortDirection::Asc))
                    .await
            );
            assert_eq!(ids(&asc), ascending, "{} {field:?} asc", b.name);
            assert!(asc.iter().all(|m| m.parent_id == Some(root.id)));

            let desc = assert_ok!(
                svc.list_children(root.id, MessageSort::new(field, SortDirection::Desc))
                    .await
            );
            let mut descending = ascending.clone();
            descending.reverse();
            assert_eq!(ids(&desc), descending, "{} {field:?} desc", b.name);
        }
    }
}

#[tokio::test]
async fn roots_are_paginated_without_replies() {
    for b in backends().await {
        let svc = &b.service;
        let mut roots = Vec::new();
        for i in 0..5 {
            let root = assert_ok!(svc.create(&user("u1"), &format!("post {i}"), None).await);
            assert_ok!(svc.create(&user("u2"), "reply", Some(root.id)).await);
            roots.push(root.id);
        }
        let oldest_first = MessageSort::new(SortField::CreatedAt, SortDirection::Asc);

        let first = assert_ok!(svc.list_roots(PageRequest::new(1, 2), oldest_first).await);
        assert_eq!(first.total, 5, "{}", b.name);
        assert_eq!(first.total_pages, 3);
        assert_eq!(ids(&first.items), roots[..2].to_vec());

        let last = assert_ok!(svc.list_roots(PageRequest::new(3, 2), oldest_first).await);
        assert_eq!(ids(&last.items), roots[4..].to_vec(), "{}", b.name);

        let past_end = assert_ok!(svc.list_roots(PageRequest::new(9, 2), oldest_first).await);
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total, 5);

        let newest = assert_ok!(svc.list_roots(PageRequest::default(), MessageSort::default()).await);
        assert_eq!(newest.items[0].id, roots[4], "{}", b.name);
        assert!(newest.items.iter().all(Message::is_root));
    }
}

#[tokio::test]
async fn vote_on_missing_message_is_not_found() {
    for b in backends().await {
        let err = assert_err!(
            b.service
                .vote(&user("u1"), MessageId::new(), VoteKind::Dislike)
                .await
        );
        assert!(matches!(err, DomainError::NotFound { .. }), "{}", b.name);
    }
}
