#[macro_use]
mod support;

use pretty_assertions::assert_eq;
use support::{post, Post};
use tagnest_engine::{TagEngine, TagError, TagRef};
use tagnest_store::{TagBackend, TagId};

fn repeat_attach_is_a_no_op<B: TagBackend>(engine: &TagEngine<B>) {
    engine.create_tags(["a", "b"], None).expect("tags");
    let p = post(1);
    assert_eq!(engine.add_tag(&p, "a").expect("first"), 1);
    assert_eq!(engine.add_tags(&p, ["a", "b"]).expect("second"), 1);
    assert_eq!(engine.add_tags(&p, ["b", "a"]).expect("third"), 0);
    assert_eq!(engine.get_tag_names(&p, 1).expect("names"), vec!["a", "b"]);

    // one edge per pair, so the depth-1 tally stays exact
    assert_eq!(
        engine
            .tagged_by_all::<Post>(["a", "b"], 1, None)
            .expect("all")
            .len(),
        1
    );
}

fn set_tags_is_all_or_nothing<B: TagBackend>(engine: &TagEngine<B>) {
    let tags = engine.create_tags(["a", "b", "c"], None).expect("tags");
    let p = post(1);
    engine.add_tags(&p, ["a", "b"]).expect("attach");

    assert_eq!(engine.set_tags(&p, ["b", "c"]).expect("set"), 2);
    assert_eq!(engine.get_tag_names(&p, 1).expect("names"), vec!["b", "c"]);

    let err = engine
        .set_tags(&p, [TagRef::from("a"), TagRef::ById(TagId(404))])
        .expect_err("unknown id");
    assert!(matches!(err, TagError::UnknownTag(ref what) if what.contains("404")), "{err}");
    assert_eq!(engine.get_tag_names(&p, 1).expect("names"), vec!["b", "c"]);

    assert_eq!(engine.set_tags(&p, [&tags[0]]).expect("set"), 1);
    assert_eq!(engine.get_tag_names(&p, 1).expect("names"), vec!["a"]);
}

fn deleting_edges_keeps_tag_records<B: TagBackend>(engine: &TagEngine<B>) {
    engine.create_tags(["a", "b", "c"], None).expect("tags");
    let (p, q) = (post(1), post(2));
    engine.add_tags(&p, ["a", "b", "c"]).expect("p");
    engine.add_tags(&q, ["a"]).expect("q");

    assert_eq!(engine.del_tag(&p, "a").expect("del one"), 1);
    assert_eq!(engine.del_tag(&p, "a").expect("del again"), 0);
    assert_eq!(engine.del_tags(&p, ["b"]).expect("del many"), 1);
    assert_eq!(engine.del_all_tags(&p).expect("del all"), 1);

    assert!(engine.get_tags(&p, 1).expect("p tags").is_empty());
    assert_eq!(engine.get_tag_names(&q, 1).expect("q tags"), vec!["a"]);
    assert_eq!(engine.registry().all().expect("tags").len(), 3);
}

fn add_tags_or_create_registers_missing_names<B: TagBackend>(engine: &TagEngine<B>) {
    engine.create_tag("news", Some("post")).expect("existing");
    let p = Post {
        id: 1,
        namespace: Some("post"),
    };

    assert_eq!(
        engine
            .add_tags_or_create(&p, ["news", "tech"])
            .expect("attach"),
        2
    );
    assert_eq!(engine.add_tags_or_create(&p, ["tech"]).expect("again"), 0);
    assert_eq!(
        engine
            .find_tags(["news", "tech"], Some("post"))
            .expect("find")
            .len(),
        2
    );
    assert!(engine.find_tags(["tech"], None).expect("find").is_empty());
    assert!(matches!(
        engine.add_tags_or_create(&p, [""]),
        Err(TagError::InvalidTagArgument(_))
    ));
    assert_eq!(engine.registry().all().expect("tags").len(), 2);
}

fn objects_of_different_kinds_do_not_share_edges<B: TagBackend>(engine: &TagEngine<B>) {
    engine.create_tag("shared", None).expect("tag");
    let tag = engine.find_tag("shared", None).expect("find");
    engine.add_tag(&post(1), "shared").expect("post");

    // a tag with the same numeric id as the post
    assert!(!engine.has_tag(&tag, "shared", 6).expect("tag kind"));
    assert!(engine.has_tag(&post(1), "shared", 1).expect("post kind"));
}

on_both_backends!(
    repeat_attach_is_a_no_op,
    set_tags_is_all_or_nothing,
    deleting_edges_keeps_tag_records,
    add_tags_or_create_registers_missing_names,
    objects_of_different_kinds_do_not_share_edges,
);
