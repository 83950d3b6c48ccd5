use cdp_core::tokenizer::tokenize;

#[test]
fn it_renders_spoken_number_artifacts() {
    let toks = tokenize("Rate 3.5 and 1/2");
    assert_eq!(toks, vec!["rate", "3 point 5", "and", "1 over 2"]);
}

#[test]
fn it_strips_symbols_and_splits_joiners() {
    let toks = tokenize("#Seattle @council $50 bike-share self_driving!");
    assert_eq!(toks, vec!["seattle", "council", "50", "bike", "share", "self", "driving"]);
}

#[test]
fn it_keeps_stopwords_and_surface_forms() {
    let toks = tokenize("The Bicycles and the bicycle");
    assert_eq!(toks, vec!["the", "bicycles", "and", "the", "bicycle"]);
}
