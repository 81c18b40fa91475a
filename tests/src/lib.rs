mod scope;
