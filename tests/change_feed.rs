//! 变更监听集成测试
//!
//! 在 `LocalSet` 中启动编排器，模拟渲染器插入行、改写文本和属性，
//! 验证立即处理、防抖合并以及节流重扫

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::LocalSet;

use row_translator::parsers::html::dom::{
    append_child, detach_node, first_text_child, set_node_attr, set_text_content,
    set_text_node_contents,
};
use row_translator::translation::{Mutation, RescanOutcome};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{orchestrator_for, HtmlTestHelper, MockOracle, TestConfigBuilder};

/// 等待足够长的时间，让队列中的处理全部完成
async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

/// 等待启动重试全部结束
async fn settle_startup() {
    tokio::time::sleep(Duration::from_secs(6)).await;
}

/// 测试插入的新行被立即处理
#[tokio::test(start_paused = true)]
async fn test_inserted_rows_are_reconciled() {
    LocalSet::new()
        .run_until(async {
            let oracle = Arc::new(MockOracle::new().with_entry("狗狗币", "Dogecoin"));
            let html = HtmlTestHelper::token_list_page(&[]);
            let orchestrator = Rc::new(orchestrator_for(
                &html,
                Arc::clone(&oracle),
                TestConfigBuilder::new().build(),
            ));
            let tasks = orchestrator.start();
            settle().await;

            // 渲染器在另一份片段里构建新行后挂到列表上
            let fragment = HtmlTestHelper::create_test_dom(&HtmlTestHelper::token_list_page(&[(
                "n",
                "狗狗币",
                "DOGE",
            )]));
            let row = HtmlTestHelper::by_id(&fragment, "n");
            let list = HtmlTestHelper::by_id(orchestrator.dom(), "list");
            detach_node(&row);
            append_child(&list, &row);
            orchestrator.handle_mutation(Mutation::ChildList {
                added: vec![row.clone()],
            });
            settle().await;

            assert_eq!(HtmlTestHelper::text_of(orchestrator.dom(), "n-name"), "Dogecoin");
            assert!(HtmlTestHelper::is_highlighted(&HtmlTestHelper::by_id(
                orchestrator.dom(),
                "n-name"
            )));

            orchestrator.shutdown();
            for task in tasks {
                task.abort();
            }
            println!("✅ Inserted row test passed");
        })
        .await;
}

/// 测试文本改写触发防抖重新翻译，突发改写只处理一次
#[tokio::test(start_paused = true)]
async fn test_text_rewrites_are_debounced() {
    LocalSet::new()
        .run_until(async {
            let oracle = Arc::new(
                MockOracle::new()
                    .with_entry("狗狗币", "Dogecoin")
                    .with_entry("柴犬", "Shiba"),
            );
            let html = HtmlTestHelper::token_list_page(&[("a", "狗狗币", "DOGE")]);
            let config = TestConfigBuilder::new().with_debounce_ms(40).build();
            let orchestrator = Rc::new(orchestrator_for(&html, Arc::clone(&oracle), config));
            let tasks = orchestrator.start();
            settle_startup().await;
            assert_eq!(HtmlTestHelper::text_of(orchestrator.dom(), "a-name"), "Dogecoin");

            let passes_before = orchestrator.engine().stats().snapshot().passes;
            let name = HtmlTestHelper::by_id(orchestrator.dom(), "a-name");

            // 渲染器连续写了几次，中间间隔都小于防抖时间
            for text in ["柴", "柴犬", "柴犬"] {
                set_text_content(&name, text);
                orchestrator.handle_mutation(Mutation::CharacterData {
                    target: name.clone(),
                });
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            settle().await;

            assert_eq!(HtmlTestHelper::text_of(orchestrator.dom(), "a-name"), "Shiba");
            assert!(HtmlTestHelper::is_highlighted(&name));
            assert_eq!(oracle.calls_for("柴"), 0);
            assert_eq!(oracle.calls_for("柴犬"), 1);

            let passes_after = orchestrator.engine().stats().snapshot().passes;
            assert_eq!(passes_after - passes_before, 1);
            assert_eq!(orchestrator.queue().stats().get_coalesced(), 2);

            orchestrator.shutdown();
            for task in tasks {
                task.abort();
            }
            println!("✅ Debounced rewrite test passed");
        })
        .await;
}

/// 测试原地改写文本节点：改动归到所属元素，立即清除高亮并重新翻译
#[tokio::test(start_paused = true)]
async fn test_text_node_edits_resolve_to_owning_element() {
    LocalSet::new()
        .run_until(async {
            let oracle = Arc::new(
                MockOracle::new()
                    .with_entry("狗狗币", "Dogecoin")
                    .with_entry("柴犬", "Shiba"),
            );
            let html = HtmlTestHelper::token_list_page(&[("a", "狗狗币", "DOGE")]);
            let orchestrator = Rc::new(orchestrator_for(
                &html,
                Arc::clone(&oracle),
                TestConfigBuilder::new().build(),
            ));
            let tasks = orchestrator.start();
            settle_startup().await;

            let name = HtmlTestHelper::by_id(orchestrator.dom(), "a-name");
            assert!(HtmlTestHelper::is_highlighted(&name));

            // 渲染器只改了文本节点的内容，报告的目标是文本节点本身
            let text = first_text_child(&name).unwrap();
            assert!(set_text_node_contents(&text, "柴犬"));
            orchestrator.handle_mutation(Mutation::CharacterData {
                target: text.clone(),
            });

            assert!(!HtmlTestHelper::is_highlighted(&name));
            {
                let registry = orchestrator.registry().borrow();
                let state = registry.fragment_state(&name).unwrap();
                assert!(!state.processed && !state.translated);
            }

            settle().await;
            assert_eq!(HtmlTestHelper::text_of(orchestrator.dom(), "a-name"), "Shiba");
            assert!(HtmlTestHelper::is_highlighted(&name));
            assert_eq!(oracle.calls_for("柴犬"), 1);

            orchestrator.shutdown();
            for task in tasks {
                task.abort();
            }
            println!("✅ Text node edit test passed");
        })
        .await;
}

/// 测试被监视的属性变化会触发处理，其他属性不会
#[tokio::test(start_paused = true)]
async fn test_watched_attributes_trigger_reconcile() {
    LocalSet::new()
        .run_until(async {
            let oracle = Arc::new(MockOracle::new());
            let html = HtmlTestHelper::token_list_page(&[("a", "狗狗币", "DOGE")]);
            let orchestrator = Rc::new(orchestrator_for(
                &html,
                Arc::clone(&oracle),
                TestConfigBuilder::new().build(),
            ));
            let tasks = orchestrator.start();
            settle_startup().await;

            let row = HtmlTestHelper::by_id(orchestrator.dom(), "a");
            let scheduled_before = orchestrator.queue().stats().get_scheduled();

            set_node_attr(&row, "data-testid", Some("x".to_string()));
            orchestrator.handle_mutation(Mutation::Attributes {
                target: row.clone(),
                name: "data-testid".to_string(),
            });
            assert_eq!(orchestrator.queue().stats().get_scheduled(), scheduled_before);

            set_node_attr(&row, "class", Some("row row--hover".to_string()));
            orchestrator.handle_mutation(Mutation::Attributes {
                target: row.clone(),
                name: "class".to_string(),
            });
            assert_eq!(orchestrator.queue().stats().get_scheduled(), scheduled_before + 1);
            settle().await;

            // 内容未变，只重新上色，不再请求
            assert_eq!(oracle.calls(), 1);
            assert_eq!(HtmlTestHelper::text_of(orchestrator.dom(), "a-name"), "EN(狗狗币)");

            orchestrator.shutdown();
            for task in tasks {
                task.abort();
            }
            println!("✅ Watched attribute test passed");
        })
        .await;
}

/// 测试移除的行不会影响后续处理
#[tokio::test(start_paused = true)]
async fn test_removed_rows_are_swept() {
    LocalSet::new()
        .run_until(async {
            let oracle = Arc::new(MockOracle::new());
            let html = HtmlTestHelper::token_list_page(&[("a", "狗狗币", "DOGE"), ("b", "月亮", "MOON")]);
            let orchestrator = Rc::new(orchestrator_for(
                &html,
                Arc::clone(&oracle),
                TestConfigBuilder::new().build(),
            ));

            let first = orchestrator.reconcile_all_once().await;
            assert_eq!(first.rows, 2);
            assert_eq!(orchestrator.registry().borrow().row_count(), 2);

            let row = HtmlTestHelper::by_id(orchestrator.dom(), "b");
            detach_node(&row);
            orchestrator.handle_mutation(Mutation::Removed { node: row.clone() });
            drop(row);

            let second = orchestrator.reconcile_all_once().await;
            assert_eq!(second.rows, 1);
            // 一行及其两个片段
            assert_eq!(second.swept, 3);
            assert_eq!(orchestrator.registry().borrow().row_count(), 1);

            println!("✅ Removed row sweep test passed");
        })
        .await;
}

/// 测试节流重扫与启动重试
#[tokio::test(start_paused = true)]
async fn test_rescans_are_throttled() {
    LocalSet::new()
        .run_until(async {
            let oracle = Arc::new(MockOracle::new());
            let html = HtmlTestHelper::token_list_page(&[("a", "狗狗币", "DOGE")]);
            let orchestrator = Rc::new(orchestrator_for(
                &html,
                Arc::clone(&oracle),
                TestConfigBuilder::new().build(),
            ));
            let tasks = orchestrator.start();

            settle_startup().await;
            assert_eq!(HtmlTestHelper::text_of(orchestrator.dom(), "a-name"), "EN(狗狗币)");
            assert_eq!(oracle.calls(), 1);

            assert_eq!(orchestrator.request_rescan(), RescanOutcome::Immediate);
            assert_eq!(orchestrator.request_rescan(), RescanOutcome::Deferred);
            assert_eq!(orchestrator.request_rescan(), RescanOutcome::Coalesced);
            tokio::time::sleep(Duration::from_millis(700)).await;
            assert_eq!(orchestrator.request_rescan(), RescanOutcome::Immediate);

            // 重扫不会重复请求已翻译的片段
            settle().await;
            assert_eq!(oracle.calls(), 1);

            orchestrator.shutdown();
            for task in tasks {
                task.abort();
            }
            println!("✅ Throttled rescan test passed");
        })
        .await;
}
